use clap::Parser;
use seqplanner::cli::{run, Cli};
use tracing_subscriber::EnvFilter;

fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("seqplanner=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse())
}

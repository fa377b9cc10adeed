//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::constraint_enforcer::ConstraintEnforcer;
use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::adapters::json_snapshot_adapter::JsonSnapshotAdapter;
use crate::domain::config_validation::{parse_float_list, validate_planner_config};
use crate::domain::context::TransactionCostModel;
use crate::domain::error::PlannerError;
use crate::domain::evaluation::evaluate_batch;
use crate::domain::filter::{FilterContext, FilterPipeline, FilterSettings};
use crate::domain::monte_carlo::MonteCarloEvaluator;
use crate::domain::planner::{HolisticPlanner, PlanResult, PlanningSnapshot};
use crate::domain::planner_config::{
    MonteCarloSettings, PlannerConfiguration, RiskSettings, StochasticSettings,
};
use crate::domain::risk::{build_risk_report, PriceSeries, RiskParameters, RiskReport};
use crate::domain::scoring::{AllocationFitScorer, ScoringWeights};
use crate::domain::stochastic::{equal_weights, evaluate_scenarios, DEFAULT_SHIFTS};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_history_port::PriceHistoryPort;
use crate::ports::report_port::ReportPort;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Parser, Debug)]
#[command(name = "seqplanner", about = "Exhaustive trade sequence planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a trading plan from a planning snapshot
    Plan {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory of <SYMBOL>.csv close price files
        #[arg(long)]
        prices: Option<PathBuf>,
    },
    /// Evaluate a batch of sequences
    Evaluate {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score a sequence under random price paths
    MonteCarlo {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        paths: Option<usize>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Score a sequence under fixed price shifts
    Stochastic {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Risk report for a set of symbols, or every CSV under `--prices`
    Risk {
        #[arg(long)]
        prices: PathBuf,
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        weights: Option<Vec<f64>>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a planner configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Plan {
            config,
            input,
            output,
            prices,
        } => run_plan(&config, &input, output.as_deref(), prices.as_deref()),
        Command::Evaluate {
            input,
            config,
            output,
        } => run_evaluate(&input, config.as_deref(), output.as_deref()),
        Command::MonteCarlo {
            input,
            config,
            seed,
            paths,
            output,
        } => run_monte_carlo(&input, config.as_deref(), seed, paths, output.as_deref()),
        Command::Stochastic {
            input,
            config,
            output,
        } => run_stochastic(&input, config.as_deref(), output.as_deref()),
        Command::Risk {
            prices,
            symbols,
            weights,
            start,
            end,
            config,
            output,
        } => run_risk(
            &prices,
            &symbols,
            weights.as_deref(),
            (start, end),
            config.as_deref(),
            output.as_deref(),
        ),
        Command::Validate { config } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PlannerError> {
    info!(path = %path.display(), "loading config");
    FileConfigAdapter::from_file(path)
}

/// Load, validate and build the configuration; defaults when no file is given.
pub fn load_planner_config(path: Option<&Path>) -> Result<PlannerConfiguration, PlannerError> {
    let Some(path) = path else {
        return Ok(PlannerConfiguration::default());
    };
    let adapter = load_config(path)?;
    validate_planner_config(&adapter)?;
    build_planner_config(&adapter)
}

fn get_count(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PlannerError> {
    let value = adapter.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| PlannerError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{key} must be non-negative"),
    })
}

fn get_list(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<Vec<f64>>, PlannerError> {
    adapter
        .get_string(section, key)
        .map(|raw| {
            parse_float_list(&raw).map_err(|reason| PlannerError::ConfigInvalid {
                section: section.into(),
                key: key.into(),
                reason,
            })
        })
        .transpose()
}

pub fn build_planner_config(
    adapter: &dyn ConfigPort,
) -> Result<PlannerConfiguration, PlannerError> {
    let defaults = PlannerConfiguration::default();
    let default_costs = TransactionCostModel::default();
    let default_filters = FilterSettings::default();
    let default_scoring = ScoringWeights::default();
    let default_mc = MonteCarloSettings::default();
    let default_risk = RiskSettings::default();

    let shifts = get_list(adapter, "stochastic", "shifts")?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SHIFTS.to_vec());
    let weights = get_list(adapter, "stochastic", "weights")?
        .filter(|w| !w.is_empty())
        .unwrap_or_else(|| equal_weights(shifts.len()));

    let seed = adapter.get_int("monte_carlo", "seed", default_mc.seed as i64);
    let seed = u64::try_from(seed).map_err(|_| PlannerError::ConfigInvalid {
        section: "monte_carlo".into(),
        key: "seed".into(),
        reason: "seed must be non-negative".into(),
    })?;

    Ok(PlannerConfiguration {
        name: adapter
            .get_string("planner", "name")
            .unwrap_or(defaults.name),
        max_depth: get_count(adapter, "planner", "max_depth", defaults.max_depth)?,
        max_sequences: get_count(adapter, "planner", "max_sequences", defaults.max_sequences)?,
        max_plan_attempts: get_count(
            adapter,
            "planner",
            "max_plan_attempts",
            defaults.max_plan_attempts,
        )?,
        max_opportunities_per_category: get_count(
            adapter,
            "planner",
            "max_opportunities_per_category",
            defaults.max_opportunities_per_category,
        )?,
        priority_threshold: adapter.get_double(
            "planner",
            "priority_threshold",
            defaults.priority_threshold,
        ),
        prune_infeasible: adapter.get_bool(
            "planner",
            "prune_infeasible",
            defaults.prune_infeasible,
        ),
        allow_buy: adapter.get_bool("planner", "allow_buy", defaults.allow_buy),
        allow_sell: adapter.get_bool("planner", "allow_sell", defaults.allow_sell),
        transaction_costs: TransactionCostModel {
            fixed: adapter.get_double("costs", "transaction_cost_fixed", default_costs.fixed),
            percent: adapter.get_double("costs", "transaction_cost_percent", default_costs.percent),
        },
        cost_penalty_factor: adapter.get_double(
            "costs",
            "cost_penalty_factor",
            defaults.cost_penalty_factor,
        ),
        filters: FilterSettings {
            correlation_aware: adapter.get_bool(
                "filters",
                "correlation_aware",
                default_filters.correlation_aware,
            ),
            diversity: adapter.get_bool("filters", "diversity", default_filters.diversity),
            max_correlation: adapter.get_double(
                "filters",
                "max_correlation",
                default_filters.max_correlation,
            ),
            max_same_country_buys: get_count(
                adapter,
                "filters",
                "max_same_country_buys",
                default_filters.max_same_country_buys,
            )?,
            max_same_industry_buys: get_count(
                adapter,
                "filters",
                "max_same_industry_buys",
                default_filters.max_same_industry_buys,
            )?,
        },
        scoring: ScoringWeights {
            geographic: adapter.get_double(
                "scoring",
                "geographic_weight",
                default_scoring.geographic,
            ),
            industry: adapter.get_double("scoring", "industry_weight", default_scoring.industry),
            quality: adapter.get_double("scoring", "quality_weight", default_scoring.quality),
            optimizer: adapter.get_double("scoring", "optimizer_weight", default_scoring.optimizer),
        },
        monte_carlo: MonteCarloSettings {
            paths: get_count(adapter, "monte_carlo", "paths", default_mc.paths)?,
            seed,
            default_volatility: adapter.get_double(
                "monte_carlo",
                "default_volatility",
                default_mc.default_volatility,
            ),
        },
        stochastic: StochasticSettings { shifts, weights },
        risk: RiskSettings {
            risk_free_rate: adapter.get_double(
                "risk",
                "risk_free_rate",
                default_risk.risk_free_rate,
            ),
            confidence: adapter.get_double("risk", "confidence", default_risk.confidence),
            shrinkage: adapter.get_bool("risk", "shrinkage", default_risk.shrinkage),
            simulations: get_count(adapter, "risk", "simulations", default_risk.simulations)?,
        },
    })
}

fn write_report<T: Serialize>(value: &T, output: Option<&Path>) -> Result<(), PlannerError> {
    let report = serde_json::to_value(value)?;
    let path = output.map(|p| p.to_string_lossy().into_owned());
    JsonReportAdapter.write(&report, path.as_deref())
}

/// Close price history for every BUY symbol the correlation filter may
/// consult. Snapshot history wins over files; missing files are skipped.
pub fn collect_price_history(
    snapshot: &PlanningSnapshot,
    prices: Option<&dyn PriceHistoryPort>,
) -> BTreeMap<String, Vec<f64>> {
    let mut history = snapshot.price_history.clone();
    let Some(port) = prices else {
        return history;
    };
    let symbols: BTreeSet<&str> = snapshot
        .opportunities
        .values()
        .flatten()
        .map(|c| c.symbol.as_str())
        .collect();
    for symbol in symbols {
        if history.contains_key(symbol) {
            continue;
        }
        match port.close_series(symbol, None, None) {
            Ok(closes) => {
                history.insert(symbol.to_string(), closes);
            }
            Err(e) => warn!(symbol, error = %e, "no price history, correlations unavailable"),
        }
    }
    history
}

/// Enforce, generate, filter, evaluate and select for one snapshot.
pub fn run_plan_pipeline(
    config: &PlannerConfiguration,
    snapshot: &PlanningSnapshot,
    prices: Option<&dyn PriceHistoryPort>,
) -> Result<PlanResult, PlannerError> {
    let history = collect_price_history(snapshot, prices);
    let filter_ctx = FilterContext::new(snapshot.evaluation_context.securities.clone())
        .with_price_history(&history);
    let filters = FilterPipeline::from_settings(&config.filters);
    info!(filters = filters.len(), symbols = history.len(), "filters ready");

    let enforcer = ConstraintEnforcer::new();
    let scorer = AllocationFitScorer::new(config.scoring.clone());
    HolisticPlanner::new(&enforcer, &scorer)
        .with_filters(filters, Some(filter_ctx))
        .create_plan(
            &snapshot.opportunities,
            &snapshot.opportunity_context,
            &snapshot.evaluation_context,
            config,
        )
}

fn run_plan(
    config_path: &Path,
    input: &Path,
    output: Option<&Path>,
    prices_dir: Option<&Path>,
) -> Result<(), PlannerError> {
    // Stage 1: config
    let config = load_planner_config(Some(config_path))?;
    info!(name = %config.name, max_depth = config.max_depth, "planner configured");

    // Stage 2: snapshot
    info!(path = %input.display(), "loading planning snapshot");
    let snapshot = JsonSnapshotAdapter.load_planning(input)?;

    // Stage 3: plan
    let price_adapter = prices_dir.map(|dir| CsvPriceAdapter::new(dir.to_path_buf()));
    let result = run_plan_pipeline(
        &config,
        &snapshot,
        price_adapter.as_ref().map(|a| a as &dyn PriceHistoryPort),
    )?;
    info!(
        steps = result.plan.steps.len(),
        improvement = result.plan.improvement,
        rejected_sequences = result.rejected_sequences.len(),
        "plan created"
    );

    // Stage 4: report
    write_report(&result, output)
}

fn run_evaluate(
    input: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), PlannerError> {
    let config = load_planner_config(config_path)?;
    let request = JsonSnapshotAdapter.load_batch(input)?;
    info!(sequences = request.sequences.len(), "evaluating batch");

    let scorer = AllocationFitScorer::new(config.scoring);
    let response = evaluate_batch(&request.sequences, &request.evaluation_context, &scorer)?;
    if response.error_count() > 0 {
        warn!(errors = response.error_count(), "some sequences failed evaluation");
    }
    write_report(&response, output)
}

fn run_monte_carlo(
    input: &Path,
    config_path: Option<&Path>,
    seed: Option<u64>,
    paths: Option<usize>,
    output: Option<&Path>,
) -> Result<(), PlannerError> {
    let config = load_planner_config(config_path)?;
    let mut request = JsonSnapshotAdapter.load_monte_carlo(input)?;
    if let Some(seed) = seed {
        request.seed = seed;
    }
    if let Some(paths) = paths {
        request.paths = paths;
    }
    info!(paths = request.paths, seed = request.seed, "running monte carlo evaluation");

    let scorer = AllocationFitScorer::new(config.scoring);
    let result = MonteCarloEvaluator::new(&scorer)
        .with_default_volatility(config.monte_carlo.default_volatility)
        .evaluate(&request)?;
    write_report(&result, output)
}

fn run_stochastic(
    input: &Path,
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), PlannerError> {
    let config = load_planner_config(config_path)?;
    let mut request = JsonSnapshotAdapter.load_stochastic(input)?;
    if config_path.is_some() {
        request.shifts = config.stochastic.shifts;
        request.weights = config.stochastic.weights;
    }
    info!(scenarios = request.shifts.len(), "running stochastic evaluation");

    let scorer = AllocationFitScorer::new(config.scoring);
    let result = evaluate_scenarios(&request, &scorer)?;
    write_report(&result, output)
}

/// Symbols to report on: the requested ones, or everything the port lists.
pub fn resolve_symbols(
    prices: &dyn PriceHistoryPort,
    requested: &[String],
) -> Result<Vec<String>, PlannerError> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    let listed = prices.list_symbols()?;
    if listed.is_empty() {
        return Err(PlannerError::invalid_input("no price files found"));
    }
    info!(symbols = listed.len(), "reporting on every listed symbol");
    Ok(listed)
}

/// Risk report over the CSV close series of `symbols`.
pub fn build_symbol_report(
    prices: &dyn PriceHistoryPort,
    symbols: &[String],
    weights: Option<&[f64]>,
    range: (Option<NaiveDate>, Option<NaiveDate>),
    config: &PlannerConfiguration,
) -> Result<RiskReport, PlannerError> {
    let mut series = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let points = prices.fetch_closes(symbol, range.0, range.1)?;
        let days = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (last.date - first.date).num_days() as f64,
            _ => 0.0,
        };
        info!(symbol = %symbol, observations = points.len(), "price history loaded");
        series.push(PriceSeries {
            symbol: symbol.clone(),
            closes: points.iter().map(|p| p.close).collect(),
            days,
        });
    }

    let params = RiskParameters {
        risk_free_rate: config.risk.risk_free_rate,
        confidence: config.risk.confidence,
        shrinkage: config.risk.shrinkage,
        simulations: config.risk.simulations,
        seed: config.monte_carlo.seed,
    };
    build_risk_report(&series, weights, &params)
}

fn run_risk(
    prices_dir: &Path,
    symbols: &[String],
    weights: Option<&[f64]>,
    range: (Option<NaiveDate>, Option<NaiveDate>),
    config_path: Option<&Path>,
    output: Option<&Path>,
) -> Result<(), PlannerError> {
    let config = load_planner_config(config_path)?;
    let adapter = CsvPriceAdapter::new(prices_dir.to_path_buf());
    let symbols = resolve_symbols(&adapter, symbols)?;
    let report = build_symbol_report(&adapter, &symbols, weights, range, &config)?;
    write_report(&report, output)
}

fn run_validate(config_path: &Path) -> Result<(), PlannerError> {
    let adapter = load_config(config_path)?;
    validate_planner_config(&adapter)?;
    let config = build_planner_config(&adapter)?;

    eprintln!("Planner: {}", config.name);
    eprintln!(
        "  depth {} | max sequences {} | prune infeasible {}",
        config.max_depth, config.max_sequences, config.prune_infeasible
    );
    eprintln!(
        "  costs {:.2} + {:.4} x value | penalty {}",
        config.transaction_costs.fixed, config.transaction_costs.percent, config.cost_penalty_factor
    );
    eprintln!(
        "  monte carlo {} paths, seed {} | {} stress scenarios",
        config.monte_carlo.paths,
        config.monte_carlo.seed,
        config.stochastic.shifts.len()
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

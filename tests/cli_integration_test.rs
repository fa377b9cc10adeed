//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Config loading and validation with real INI files on disk
//! - Argument parsing for each subcommand
//! - The plan pipeline from a JSON snapshot through to the written report
//! - Risk reports from per-symbol CSV files

mod common;

use chrono::NaiveDate;
use clap::Parser;
use common::*;
use seqplanner::adapters::csv_adapter::CsvPriceAdapter;
use seqplanner::adapters::file_config_adapter::FileConfigAdapter;
use seqplanner::cli::{self, Cli, Command};
use seqplanner::domain::action::TradeSide;
use seqplanner::domain::context::{OpportunitiesByCategory, OpportunityCategory};
use seqplanner::domain::error::PlannerError;
use seqplanner::domain::planner::PlanningSnapshot;
use seqplanner::domain::planner_config::PlannerConfiguration;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[planner]
name = balanced
max_depth = 3
max_sequences = 500
max_plan_attempts = 5
max_opportunities_per_category = 4
priority_threshold = 0.1
prune_infeasible = true
allow_buy = true
allow_sell = true

[costs]
transaction_cost_fixed = 1.0
transaction_cost_percent = 0.001
cost_penalty_factor = 0.05

[filters]
correlation_aware = true
diversity = true
max_correlation = 0.75
max_same_country_buys = 2
max_same_industry_buys = 2

[scoring]
geographic_weight = 0.2
industry_weight = 0.2
quality_weight = 0.2
optimizer_weight = 0.4

[monte_carlo]
paths = 250
seed = 7
default_volatility = 0.25

[stochastic]
shifts = -0.1, 0.0, 0.1
weights = 0.25, 0.5, 0.25

[risk]
risk_free_rate = 0.03
confidence = 0.99
shrinkage = true
simulations = 500
"#;

fn planning_snapshot() -> PlanningSnapshot {
    let securities = vec![
        make_security("AAPL", "US", "Technology"),
        make_security("GOOGL", "US", "Technology"),
        make_security("SAP", "DE", "Technology"),
    ];
    let mut opportunities = OpportunitiesByCategory::new();
    opportunities.insert(
        OpportunityCategory::ProfitTaking,
        vec![sell("AAPL", 10, 1000.0, 0.8)],
    );
    opportunities.insert(
        OpportunityCategory::OpportunityBuys,
        vec![buy("GOOGL", 5, 500.0, 0.7), buy("SAP", 2, 200.0, 0.05)],
    );
    PlanningSnapshot {
        opportunities,
        opportunity_context: opportunity_context(100.0, &securities),
        evaluation_context: evaluation_context(
            100.0,
            &[("AAPL", 2000.0)],
            &["AAPL", "GOOGL", "SAP"],
            &securities,
        ),
        price_history: BTreeMap::new(),
    }
}

fn write_snapshot(dir: &Path, snapshot: &PlanningSnapshot) -> PathBuf {
    let path = dir.join("snapshot.json");
    fs::write(&path, serde_json::to_string_pretty(snapshot).unwrap()).unwrap();
    path
}

fn write_prices(dir: &Path, symbol: &str, closes: &[f64]) {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let mut content = String::from("date,open,close\n");
    for (i, close) in closes.iter().enumerate() {
        let date = start + chrono::Duration::days(i as i64);
        content.push_str(&format!("{},{},{}\n", date.format("%Y-%m-%d"), close, close));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

mod config_loading {
    use super::*;

    #[test]
    fn valid_ini_builds_every_section() {
        let file = write_temp_ini(VALID_INI);
        let config = cli::load_planner_config(Some(file.path())).unwrap();

        assert_eq!(config.name, "balanced");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.max_sequences, 500);
        assert_eq!(config.max_plan_attempts, 5);
        assert_eq!(config.max_opportunities_per_category, 4);
        assert_eq!(config.priority_threshold, 0.1);
        assert_eq!(config.transaction_costs.fixed, 1.0);
        assert_eq!(config.transaction_costs.percent, 0.001);
        assert_eq!(config.cost_penalty_factor, 0.05);
        assert_eq!(config.filters.max_correlation, 0.75);
        assert_eq!(config.filters.max_same_country_buys, 2);
        assert_eq!(config.scoring.optimizer, 0.4);
        assert_eq!(config.monte_carlo.paths, 250);
        assert_eq!(config.monte_carlo.seed, 7);
        assert_eq!(config.stochastic.shifts, vec![-0.1, 0.0, 0.1]);
        assert_eq!(config.stochastic.weights, vec![0.25, 0.5, 0.25]);
        assert_eq!(config.risk.confidence, 0.99);
        assert!(config.risk.shrinkage);
        assert_eq!(config.risk.simulations, 500);
    }

    #[test]
    fn no_file_means_defaults() {
        let config = cli::load_planner_config(None).unwrap();
        assert_eq!(config, PlannerConfiguration::default());
    }

    #[test]
    fn empty_ini_matches_defaults() {
        let adapter = FileConfigAdapter::from_string("").unwrap();
        let config = cli::build_planner_config(&adapter).unwrap();
        assert_eq!(config, PlannerConfiguration::default());
    }

    #[test]
    fn missing_file_is_parse_error() {
        let missing = Path::new("/nonexistent/planner.ini");
        let err = cli::load_planner_config(Some(missing)).unwrap_err();
        assert!(matches!(err, PlannerError::ConfigParse { .. }));
        assert_eq!(ExitCode::from(&err), ExitCode::from(2));
    }

    #[test]
    fn zero_depth_rejected() {
        let file = write_temp_ini("[planner]\nmax_depth = 0\n");
        let err = cli::load_planner_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, PlannerError::ConfigInvalid { key, .. } if key == "max_depth"));
    }

    #[test]
    fn mismatched_stress_weights_rejected() {
        let file = write_temp_ini("[stochastic]\nshifts = -0.1, 0.1\nweights = 1.0\n");
        let err = cli::load_planner_config(Some(file.path())).unwrap_err();
        assert!(matches!(
            err,
            PlannerError::ConfigInvalid { section, key, .. }
                if section == "stochastic" && key == "weights"
        ));
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let file = write_temp_ini("[risk]\nconfidence = 1.5\n");
        let err = cli::load_planner_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, PlannerError::ConfigInvalid { key, .. } if key == "confidence"));
    }

    #[test]
    fn validate_command_exit_codes() {
        let good = write_temp_ini(VALID_INI);
        let bad = write_temp_ini("[filters]\nmax_correlation = 3.0\n");
        let run_validate = |path: &Path| {
            cli::run(Cli {
                command: Command::Validate {
                    config: path.to_path_buf(),
                },
            })
        };
        assert_eq!(run_validate(good.path()), ExitCode::SUCCESS);
        assert_eq!(run_validate(bad.path()), ExitCode::from(2));
    }
}

mod argument_parsing {
    use super::*;

    #[test]
    fn plan_arguments() {
        let cli = Cli::try_parse_from([
            "seqplanner", "plan", "-c", "planner.ini", "-i", "snapshot.json", "--prices", "prices",
        ])
        .unwrap();
        match cli.command {
            Command::Plan {
                config,
                input,
                output,
                prices,
            } => {
                assert_eq!(config, PathBuf::from("planner.ini"));
                assert_eq!(input, PathBuf::from("snapshot.json"));
                assert!(output.is_none());
                assert_eq!(prices, Some(PathBuf::from("prices")));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn risk_lists_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "seqplanner",
            "risk",
            "--prices",
            "prices",
            "--symbols",
            "AAPL,SAP",
            "--weights",
            "0.6,0.4",
            "--start",
            "2024-01-01",
        ])
        .unwrap();
        match cli.command {
            Command::Risk {
                symbols,
                weights,
                start,
                end,
                ..
            } => {
                assert_eq!(symbols, vec!["AAPL".to_string(), "SAP".to_string()]);
                assert_eq!(weights, Some(vec![0.6, 0.4]));
                assert_eq!(start, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert!(end.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn monte_carlo_overrides() {
        let cli = Cli::try_parse_from([
            "seqplanner", "monte-carlo", "-i", "request.json", "--seed", "9", "--paths", "50",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::MonteCarlo { seed: Some(9), paths: Some(50), .. }
        ));
    }

    #[test]
    fn risk_symbols_are_optional() {
        let cli = Cli::try_parse_from(["seqplanner", "risk", "--prices", "prices"]).unwrap();
        match cli.command {
            Command::Risk { symbols, .. } => assert!(symbols.is_empty()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn risk_requires_prices() {
        assert!(Cli::try_parse_from(["seqplanner", "risk", "--symbols", "AAPL"]).is_err());
    }
}

mod plan_pipeline {
    use super::*;

    #[test]
    fn threshold_drops_low_priority_buy() {
        let file = write_temp_ini(VALID_INI);
        let config = cli::load_planner_config(Some(file.path())).unwrap();
        let result = cli::run_plan_pipeline(&config, &planning_snapshot(), None).unwrap();

        assert!(result.plan.steps.iter().all(|s| s.symbol != "SAP"));
        let sap = result
            .pre_filtered
            .iter()
            .find(|p| p.symbol == "SAP")
            .unwrap();
        assert_eq!(sap.side, TradeSide::Buy);
        assert_eq!(sap.reasons, vec!["below priority threshold".to_string()]);
    }

    #[test]
    fn csv_prices_feed_correlations() {
        let dir = TempDir::new().unwrap();
        let path: Vec<f64> = (0..40).map(|i| 50.0 + (i as f64 * 0.9).cos() * 3.0).collect();
        write_prices(dir.path(), "GOOGL", &path);
        write_prices(dir.path(), "SAP", &path);
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());

        let history = cli::collect_price_history(&planning_snapshot(), Some(&prices));
        assert_eq!(history.get("GOOGL").map(Vec::len), Some(40));
        assert_eq!(history.get("SAP").map(Vec::len), Some(40));
        assert!(!history.contains_key("AAPL"));
    }

    #[test]
    fn snapshot_history_takes_precedence() {
        let dir = TempDir::new().unwrap();
        write_prices(dir.path(), "GOOGL", &[1.0, 2.0, 3.0]);
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let mut snapshot = planning_snapshot();
        snapshot.price_history.insert("GOOGL".into(), vec![10.0, 11.0]);

        let history = cli::collect_price_history(&snapshot, Some(&prices));
        assert_eq!(history["GOOGL"], vec![10.0, 11.0]);
    }

    #[test]
    fn plan_command_writes_report() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(VALID_INI);
        let input = write_snapshot(dir.path(), &planning_snapshot());
        let output = dir.path().join("plan.json");

        let code = cli::run(Cli {
            command: Command::Plan {
                config: ini.path().to_path_buf(),
                input,
                output: Some(output.clone()),
                prices: None,
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        let steps = report["plan"]["steps"].as_array().unwrap();
        assert!(!steps.is_empty());
        assert_eq!(steps[0]["side"], "SELL");
        assert_eq!(steps[0]["symbol"], "AAPL");
        assert!(report["pre_filtered"].is_array());
        assert!(report["rejected_sequences"].is_array());
    }

    #[test]
    fn no_feasible_sequence_exit_code() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(VALID_INI);
        let mut snapshot = planning_snapshot();
        snapshot.opportunities.remove(&OpportunityCategory::ProfitTaking);
        snapshot.opportunity_context.available_cash_eur = 0.0;
        snapshot.evaluation_context.available_cash_eur = 0.0;
        let input = write_snapshot(dir.path(), &snapshot);

        let code = cli::run(Cli {
            command: Command::Plan {
                config: ini.path().to_path_buf(),
                input,
                output: Some(dir.path().join("plan.json")),
                prices: None,
            },
        });
        assert_eq!(code, ExitCode::from(5));
    }

    #[test]
    fn malformed_snapshot_exit_code() {
        let dir = TempDir::new().unwrap();
        let ini = write_temp_ini(VALID_INI);
        let input = dir.path().join("snapshot.json");
        fs::write(&input, "{ not json").unwrap();

        let code = cli::run(Cli {
            command: Command::Plan {
                config: ini.path().to_path_buf(),
                input,
                output: None,
                prices: None,
            },
        });
        assert_eq!(code, ExitCode::from(3));
    }
}

mod risk_report {
    use super::*;

    fn price_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        write_prices(
            dir.path(),
            "AAPL",
            &[100.0, 102.0, 99.0, 104.0, 103.0, 107.0, 101.0, 108.0, 110.0, 109.0],
        );
        write_prices(
            dir.path(),
            "SAP",
            &[50.0, 50.5, 49.0, 51.0, 52.0, 51.5, 50.0, 53.0, 52.5, 54.0],
        );
        dir
    }

    fn symbols() -> Vec<String> {
        vec!["AAPL".to_string(), "SAP".to_string()]
    }

    #[test]
    fn report_from_csv_files() {
        let dir = price_dir();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let report = cli::build_symbol_report(
            &prices,
            &symbols(),
            None,
            (None, None),
            &PlannerConfiguration::default(),
        )
        .unwrap();

        assert_eq!(report.symbols.len(), 2);
        assert_eq!(report.symbols[0].symbol, "AAPL");
        assert_eq!(report.symbols[0].observations, 10);
        assert!(report.shrinkage_intensity.is_none());
        assert!(report.portfolio.annualized_volatility > 0.0);
    }

    #[test]
    fn date_range_limits_observations() {
        let dir = price_dir();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let report = cli::build_symbol_report(
            &prices,
            &symbols(),
            Some(&[0.5, 0.5]),
            (
                NaiveDate::from_ymd_opt(2024, 1, 3),
                NaiveDate::from_ymd_opt(2024, 1, 7),
            ),
            &PlannerConfiguration::default(),
        )
        .unwrap();
        assert!(report.symbols.iter().all(|s| s.observations == 5));
        assert_eq!(report.portfolio.weights, vec![0.5, 0.5]);
    }

    #[test]
    fn shrinkage_follows_config() {
        let dir = price_dir();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let file = write_temp_ini(VALID_INI);
        let config = cli::load_planner_config(Some(file.path())).unwrap();
        let report =
            cli::build_symbol_report(&prices, &symbols(), None, (None, None), &config).unwrap();
        assert!(report.shrinkage_intensity.is_some());
        assert_eq!(report.confidence, 0.99);
    }

    #[test]
    fn unknown_symbol_is_price_history_error() {
        let dir = price_dir();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let err = cli::build_symbol_report(
            &prices,
            &["MISSING".to_string()],
            None,
            (None, None),
            &PlannerConfiguration::default(),
        )
        .unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::from(4));
        assert!(matches!(&err, PlannerError::PriceHistory { symbol, .. } if symbol == "MISSING"));
    }

    #[test]
    fn risk_command_writes_report() {
        let dir = price_dir();
        let output = dir.path().join("risk.json");
        let code = cli::run(Cli {
            command: Command::Risk {
                prices: dir.path().to_path_buf(),
                symbols: symbols(),
                weights: None,
                start: None,
                end: None,
                config: None,
                output: Some(output.clone()),
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["symbols"].as_array().map(Vec::len), Some(2));
        assert!(report["portfolio"]["monte_carlo_cvar"].is_number());
    }

    #[test]
    fn requested_symbols_are_kept_as_given() {
        let dir = price_dir();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let requested = vec!["SAP".to_string()];
        assert_eq!(cli::resolve_symbols(&prices, &requested).unwrap(), requested);
    }

    #[test]
    fn no_symbols_means_every_csv_file() {
        let dir = price_dir();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        assert_eq!(cli::resolve_symbols(&prices, &[]).unwrap(), symbols());
    }

    #[test]
    fn empty_price_directory_is_invalid_input() {
        let dir = TempDir::new().unwrap();
        let prices = CsvPriceAdapter::new(dir.path().to_path_buf());
        let err = cli::resolve_symbols(&prices, &[]).unwrap_err();
        assert_eq!(ExitCode::from(&err), ExitCode::from(3));
    }

    #[test]
    fn risk_command_without_symbols_reports_every_file() {
        let dir = price_dir();
        let output = dir.path().join("risk.json");
        let code = cli::run(Cli {
            command: Command::Risk {
                prices: dir.path().to_path_buf(),
                symbols: Vec::new(),
                weights: None,
                start: None,
                end: None,
                config: None,
                output: Some(output.clone()),
            },
        });
        assert_eq!(code, ExitCode::SUCCESS);

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        let names: Vec<&str> = report["symbols"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s["symbol"].as_str())
            .collect();
        assert_eq!(names, vec!["AAPL", "SAP"]);
    }
}

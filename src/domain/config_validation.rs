//! Configuration validation.
//!
//! Every planner section is checked before any snapshot is loaded so a bad
//! INI file fails fast with the offending section and key.

use crate::domain::error::PlannerError;
use crate::domain::monte_carlo::MAX_PATHS;
use crate::ports::config_port::ConfigPort;

pub fn validate_planner_config(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    validate_planner(config)?;
    validate_costs(config)?;
    validate_filters(config)?;
    validate_monte_carlo(config)?;
    validate_stochastic(config)?;
    validate_scoring(config)?;
    validate_risk(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> PlannerError {
    PlannerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse a comma separated list of numbers. Empty input gives an empty list.
pub fn parse_float_list(value: &str) -> Result<Vec<f64>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|_| format!("'{s}' is not a number"))
        })
        .collect()
}

fn validate_planner(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let depth = config.get_int("planner", "max_depth", 8);
    if depth < 1 {
        return Err(invalid("planner", "max_depth", "max_depth must be at least 1"));
    }
    for key in ["max_sequences", "max_plan_attempts", "max_opportunities_per_category"] {
        if config.get_int("planner", key, 0) < 0 {
            return Err(invalid("planner", key, format!("{key} must be non-negative")));
        }
    }
    let threshold = config.get_double("planner", "priority_threshold", 0.0);
    if !threshold.is_finite() {
        return Err(invalid(
            "planner",
            "priority_threshold",
            "priority_threshold must be a finite number",
        ));
    }
    Ok(())
}

fn validate_costs(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    for (key, default) in [
        ("transaction_cost_fixed", 2.0),
        ("transaction_cost_percent", 0.002),
        ("cost_penalty_factor", 0.1),
    ] {
        let value = config.get_double("costs", key, default);
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("costs", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_filters(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let max_correlation = config.get_double("filters", "max_correlation", 0.8);
    if !(0.0..=1.0).contains(&max_correlation) {
        return Err(invalid(
            "filters",
            "max_correlation",
            "max_correlation must be between 0 and 1",
        ));
    }
    for key in ["max_same_country_buys", "max_same_industry_buys"] {
        if config.get_int("filters", key, 0) < 0 {
            return Err(invalid("filters", key, format!("{key} must be non-negative")));
        }
    }
    Ok(())
}

fn validate_monte_carlo(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let paths = config.get_int("monte_carlo", "paths", 100);
    if paths < 1 || paths > MAX_PATHS as i64 {
        return Err(invalid(
            "monte_carlo",
            "paths",
            format!("paths must be between 1 and {MAX_PATHS}"),
        ));
    }
    if config.get_int("monte_carlo", "seed", 42) < 0 {
        return Err(invalid("monte_carlo", "seed", "seed must be non-negative"));
    }
    let vol = config.get_double("monte_carlo", "default_volatility", 0.2);
    if !vol.is_finite() || vol < 0.0 {
        return Err(invalid(
            "monte_carlo",
            "default_volatility",
            "default_volatility must be non-negative",
        ));
    }
    Ok(())
}

fn validate_stochastic(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let shifts = match config.get_string("stochastic", "shifts") {
        Some(s) => parse_float_list(&s).map_err(|e| invalid("stochastic", "shifts", e))?,
        None => Vec::new(),
    };
    if let Some(shift) = shifts.iter().find(|s| **s <= -1.0) {
        return Err(invalid(
            "stochastic",
            "shifts",
            format!("shift {shift} would make prices non-positive"),
        ));
    }
    let weights = match config.get_string("stochastic", "weights") {
        Some(s) => parse_float_list(&s).map_err(|e| invalid("stochastic", "weights", e))?,
        None => return Ok(()),
    };
    if weights.iter().any(|w| *w < 0.0) {
        return Err(invalid("stochastic", "weights", "weights must be non-negative"));
    }
    let expected = if shifts.is_empty() { 5 } else { shifts.len() };
    if !weights.is_empty() && weights.len() != expected {
        return Err(invalid(
            "stochastic",
            "weights",
            format!("{} weights given for {expected} shifts", weights.len()),
        ));
    }
    Ok(())
}

fn validate_scoring(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let mut total = 0.0;
    for (key, default) in [
        ("geographic_weight", 0.25),
        ("industry_weight", 0.25),
        ("quality_weight", 0.15),
        ("optimizer_weight", 0.35),
    ] {
        let value = config.get_double("scoring", key, default);
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("scoring", key, format!("{key} must be non-negative")));
        }
        total += value;
    }
    if total <= 0.0 {
        return Err(invalid(
            "scoring",
            "optimizer_weight",
            "scoring weights must sum to a positive number",
        ));
    }
    Ok(())
}

fn validate_risk(config: &dyn ConfigPort) -> Result<(), PlannerError> {
    let confidence = config.get_double("risk", "confidence", 0.95);
    if confidence <= 0.0 || confidence >= 1.0 {
        return Err(invalid(
            "risk",
            "confidence",
            "confidence must be strictly between 0 and 1",
        ));
    }
    let rate = config.get_double("risk", "risk_free_rate", 0.02);
    if !(0.0..1.0).contains(&rate) {
        return Err(invalid(
            "risk",
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    if config.get_int("risk", "simulations", 10_000) < 1 {
        return Err(invalid("risk", "simulations", "simulations must be at least 1"));
    }
    Ok(())
}

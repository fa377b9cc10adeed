//! Risk-adjusted return ratios over daily returns.

use super::returns::{mean, sample_std_dev};
use super::TRADING_DAYS_PER_YEAR;

/// Annualized Sharpe ratio. `risk_free_rate` is annual.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let stddev = sample_std_dev(returns);
    if stddev == 0.0 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    (mean(returns) - daily_rf) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio.
///
/// Downside deviation only counts returns below `target` (the minimum
/// acceptable daily return) and is averaged over every period. A series with
/// no downside yields 0.0 rather than an infinite ratio.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, target: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < target)
        .map(|&r| (r - target).powi(2))
        .sum();
    let downside_dev = (downside_sq / n).sqrt();
    if downside_dev == 0.0 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    (mean(returns) - daily_rf) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

//! Per-symbol and portfolio risk report assembled from close price series.

use serde::Serialize;
use tracing::warn;

use super::correlation::{
    correlation_matrix, covariance_matrix, inverse_variance_weights, ledoit_wolf_shrinkage,
};
use super::drawdown::{drawdown_metrics, DrawdownMetrics};
use super::ratios::{sharpe_ratio, sortino_ratio};
use super::returns::{
    annualized_return, annualized_volatility, calculate_returns, combine_portfolio_returns,
    reconstruct_prices,
};
use super::var::{conditional_value_at_risk, monte_carlo_cvar, portfolio_cvar, value_at_risk};
use super::TRADING_DAYS_PER_YEAR;
use crate::domain::error::PlannerError;

/// Confidence of the stricter tail figure reported next to the configured one.
const STRESS_CONFIDENCE: f64 = 0.99;

#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    /// Closes, oldest first.
    pub closes: Vec<f64>,
    /// Calendar days between the first and last close.
    pub days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParameters {
    pub risk_free_rate: f64,
    pub confidence: f64,
    pub shrinkage: bool,
    pub simulations: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SymbolRisk {
    pub symbol: String,
    pub observations: usize,
    pub annualized_volatility: f64,
    pub annualized_return: f64,
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub drawdown: DrawdownMetrics,
}

/// One symbol's share of the weighted CVaR.
#[derive(Debug, Clone, Serialize)]
pub struct CvarContribution {
    pub symbol: String,
    pub weight: f64,
    pub cvar: f64,
    /// `weight * cvar`.
    pub contribution: f64,
    /// Percent of the weighted portfolio CVaR; 0 when that is zero.
    pub contribution_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioRisk {
    pub weights: Vec<f64>,
    pub annualized_volatility: f64,
    pub value_at_risk: f64,
    pub conditional_value_at_risk: f64,
    /// Weighted sum of per-symbol CVaRs.
    pub weighted_cvar: f64,
    /// Weighted CVaR at 99% confidence.
    pub cvar_99: f64,
    pub monte_carlo_cvar: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub drawdown: DrawdownMetrics,
    pub contributions: Vec<CvarContribution>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub confidence: f64,
    pub symbols: Vec<SymbolRisk>,
    pub portfolio: PortfolioRisk,
    pub correlation: Vec<Vec<f64>>,
    pub covariance: Vec<Vec<f64>>,
    pub shrinkage_intensity: Option<f64>,
}

fn symbol_risk(series: &PriceSeries, returns: &[f64], params: &RiskParameters) -> SymbolRisk {
    let start = series.closes.first().copied().unwrap_or(0.0);
    let end = series.closes.last().copied().unwrap_or(0.0);
    SymbolRisk {
        symbol: series.symbol.clone(),
        observations: series.closes.len(),
        annualized_volatility: annualized_volatility(returns),
        annualized_return: annualized_return(start, end, series.days),
        value_at_risk: value_at_risk(returns, params.confidence),
        conditional_value_at_risk: conditional_value_at_risk(returns, params.confidence),
        sharpe_ratio: sharpe_ratio(returns, params.risk_free_rate),
        sortino_ratio: sortino_ratio(returns, params.risk_free_rate, 0.0),
        drawdown: drawdown_metrics(&series.closes),
    }
}

/// Embed a matrix over the `usable` symbols into an `n x n` matrix, zero elsewhere.
fn expand(matrix: &[Vec<f64>], usable: &[usize], n: usize) -> Vec<Vec<f64>> {
    let mut full = vec![vec![0.0; n]; n];
    for (a, &i) in usable.iter().enumerate() {
        for (b, &j) in usable.iter().enumerate() {
            full[i][j] = matrix[a][b];
        }
    }
    full
}

/// Build the report. Without explicit weights the portfolio uses
/// inverse-variance weights.
///
/// Symbols with fewer than two closes keep neutral per-symbol figures and are
/// left out of the portfolio with weight 0. The call fails only when no
/// symbol has enough history.
pub fn build_risk_report(
    series: &[PriceSeries],
    weights: Option<&[f64]>,
    params: &RiskParameters,
) -> Result<RiskReport, PlannerError> {
    if series.is_empty() {
        return Err(PlannerError::invalid_input("at least one symbol is required"));
    }
    if let Some(w) = weights.filter(|w| w.len() != series.len()) {
        return Err(PlannerError::invalid_input(format!(
            "{} weights given for {} symbols",
            w.len(),
            series.len()
        )));
    }

    let returns: Vec<Vec<f64>> = series.iter().map(|s| calculate_returns(&s.closes)).collect();
    let usable: Vec<usize> = (0..series.len())
        .filter(|&i| series[i].closes.len() >= 2)
        .collect();
    if usable.is_empty() {
        return Err(PlannerError::invalid_input("no symbol has at least two prices"));
    }
    for s in series.iter().filter(|s| s.closes.len() < 2) {
        warn!(
            symbol = %s.symbol,
            observations = s.closes.len(),
            "too few prices, excluded from portfolio"
        );
    }

    let usable_returns: Vec<Vec<f64>> = usable.iter().map(|&i| returns[i].clone()).collect();
    let usable_weights: Vec<f64> = match weights {
        Some(w) => usable.iter().map(|&i| w[i]).collect(),
        None => inverse_variance_weights(&usable_returns),
    };
    let mut full_weights = vec![0.0; series.len()];
    for (&i, w) in usable.iter().zip(&usable_weights) {
        full_weights[i] = *w;
    }

    let symbols = series
        .iter()
        .zip(&returns)
        .map(|(s, r)| symbol_risk(s, r, params))
        .collect();

    let sample = covariance_matrix(&usable_returns);
    let (covariance, shrinkage_intensity) = if params.shrinkage {
        let shrunk = ledoit_wolf_shrinkage(&sample);
        (shrunk.matrix, Some(shrunk.intensity))
    } else {
        (sample, None)
    };

    let combined = combine_portfolio_returns(&usable_weights, &usable_returns);
    let variance: f64 = (0..usable_weights.len())
        .flat_map(|i| (0..usable_weights.len()).map(move |j| (i, j)))
        .map(|(i, j)| usable_weights[i] * usable_weights[j] * covariance[i][j])
        .sum();

    let weighted_cvar = portfolio_cvar(&usable_weights, &usable_returns, params.confidence);
    let contributions = usable
        .iter()
        .zip(&usable_weights)
        .map(|(&i, &weight)| {
            let cvar = conditional_value_at_risk(&returns[i], params.confidence);
            let contribution = weight * cvar;
            CvarContribution {
                symbol: series[i].symbol.clone(),
                weight,
                cvar,
                contribution,
                contribution_pct: if weighted_cvar == 0.0 {
                    0.0
                } else {
                    contribution / weighted_cvar * 100.0
                },
            }
        })
        .collect();

    let portfolio = PortfolioRisk {
        annualized_volatility: (variance.max(0.0) * TRADING_DAYS_PER_YEAR).sqrt(),
        value_at_risk: value_at_risk(&combined, params.confidence),
        conditional_value_at_risk: conditional_value_at_risk(&combined, params.confidence),
        weighted_cvar,
        cvar_99: portfolio_cvar(&usable_weights, &usable_returns, STRESS_CONFIDENCE),
        monte_carlo_cvar: monte_carlo_cvar(
            &usable_weights,
            &usable_returns,
            params.confidence,
            params.simulations,
            params.seed,
        ),
        sharpe_ratio: sharpe_ratio(&combined, params.risk_free_rate),
        sortino_ratio: sortino_ratio(&combined, params.risk_free_rate, 0.0),
        drawdown: drawdown_metrics(&reconstruct_prices(1.0, &combined)),
        weights: full_weights,
        contributions,
    };

    Ok(RiskReport {
        confidence: params.confidence,
        symbols,
        portfolio,
        correlation: correlation_matrix(&returns),
        covariance: expand(&covariance, &usable, series.len()),
        shrinkage_intensity,
    })
}

//! End-state portfolio scoring.
//!
//! The evaluator depends only on the [`SequenceScorer`] trait; the weighting
//! between allocation components is configuration, not code.

use std::collections::BTreeMap;

use super::context::PortfolioContext;

/// Allocation deviation at which geographic or industry fit reaches zero.
const ALLOCATION_DEVIATION_SCALE: f64 = 0.3;
/// Weight deviation at which optimizer fit reaches zero.
const OPTIMIZER_DEVIATION_SCALE: f64 = 0.2;
/// Score used for a component with nothing to measure.
const NEUTRAL_COMPONENT: f64 = 0.5;

/// Maps a portfolio state to a score in [0, 1]; higher is better.
pub trait SequenceScorer: Send + Sync {
    fn score(&self, portfolio: &PortfolioContext) -> f64;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub geographic: f64,
    pub industry: f64,
    pub quality: f64,
    pub optimizer: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        ScoringWeights {
            geographic: 0.25,
            industry: 0.25,
            quality: 0.15,
            optimizer: 0.35,
        }
    }
}

impl ScoringWeights {
    pub fn total(&self) -> f64 {
        self.geographic + self.industry + self.quality + self.optimizer
    }
}

#[derive(Debug, Clone, Default)]
pub struct AllocationFitScorer {
    pub weights: ScoringWeights,
}

impl AllocationFitScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        AllocationFitScorer { weights }
    }

    pub fn geographic_fit(&self, portfolio: &PortfolioContext) -> f64 {
        deviation_fit(
            &portfolio.country_weights(),
            &portfolio.country_targets,
            ALLOCATION_DEVIATION_SCALE,
        )
    }

    pub fn industry_fit(&self, portfolio: &PortfolioContext) -> f64 {
        deviation_fit(
            &portfolio.industry_weights(),
            &portfolio.industry_targets,
            ALLOCATION_DEVIATION_SCALE,
        )
    }

    pub fn optimizer_fit(&self, portfolio: &PortfolioContext) -> f64 {
        deviation_fit(
            &portfolio.symbol_weights(),
            &portfolio.optimizer_targets,
            OPTIMIZER_DEVIATION_SCALE,
        )
    }

    /// Value-weighted mean security score over scored holdings.
    pub fn quality(&self, portfolio: &PortfolioContext) -> f64 {
        let mut weighted = 0.0;
        let mut value = 0.0;
        for (symbol, position_value) in &portfolio.positions {
            if let Some(score) = portfolio.security_scores.get(symbol) {
                if *position_value > 0.0 {
                    weighted += score * position_value;
                    value += position_value;
                }
            }
        }
        if value > 0.0 {
            (weighted / value).clamp(0.0, 1.0)
        } else {
            NEUTRAL_COMPONENT
        }
    }
}

impl SequenceScorer for AllocationFitScorer {
    fn score(&self, portfolio: &PortfolioContext) -> f64 {
        let total = self.weights.total();
        if total <= 0.0 {
            return NEUTRAL_COMPONENT;
        }
        let w = &self.weights;
        let combined = w.geographic * self.geographic_fit(portfolio)
            + w.industry * self.industry_fit(portfolio)
            + w.quality * self.quality(portfolio)
            + w.optimizer * self.optimizer_fit(portfolio);
        (combined / total).clamp(0.0, 1.0)
    }
}

/// 1 - mean |current - target| / scale over the target keys, clamped to [0, 1].
fn deviation_fit(
    current: &BTreeMap<String, f64>,
    targets: &BTreeMap<String, f64>,
    scale: f64,
) -> f64 {
    if targets.is_empty() {
        return NEUTRAL_COMPONENT;
    }
    let total_dev: f64 = targets
        .iter()
        .map(|(key, target)| (current.get(key).copied().unwrap_or(0.0) - target).abs())
        .sum();
    let mean_dev = total_dev / targets.len() as f64;
    (1.0 - mean_dev / scale).clamp(0.0, 1.0)
}

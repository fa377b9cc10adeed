//! Planner configuration with defaults.

use super::context::TransactionCostModel;
use super::evaluation::DEFAULT_COST_PENALTY_FACTOR;
use super::filter::FilterSettings;
use super::generator::{GenerationConfig, DEFAULT_MAX_DEPTH};
use super::monte_carlo::{DEFAULT_PATHS, DEFAULT_SEED, DEFAULT_VOLATILITY};
use super::scoring::ScoringWeights;
use super::stochastic::{equal_weights, DEFAULT_SHIFTS};

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloSettings {
    pub paths: usize,
    pub seed: u64,
    pub default_volatility: f64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        MonteCarloSettings {
            paths: DEFAULT_PATHS,
            seed: DEFAULT_SEED,
            default_volatility: DEFAULT_VOLATILITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSettings {
    pub shifts: Vec<f64>,
    pub weights: Vec<f64>,
}

impl Default for StochasticSettings {
    fn default() -> Self {
        StochasticSettings {
            shifts: DEFAULT_SHIFTS.to_vec(),
            weights: equal_weights(DEFAULT_SHIFTS.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSettings {
    pub risk_free_rate: f64,
    pub confidence: f64,
    pub shrinkage: bool,
    pub simulations: usize,
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            risk_free_rate: 0.02,
            confidence: 0.95,
            shrinkage: false,
            simulations: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfiguration {
    pub name: String,
    pub max_depth: usize,
    /// Zero means unlimited.
    pub max_sequences: usize,
    /// Zero means every feasible sequence is a selection candidate.
    pub max_plan_attempts: usize,
    /// Zero means unlimited.
    pub max_opportunities_per_category: usize,
    pub priority_threshold: f64,
    pub prune_infeasible: bool,
    pub allow_buy: bool,
    pub allow_sell: bool,
    pub transaction_costs: TransactionCostModel,
    pub cost_penalty_factor: f64,
    pub filters: FilterSettings,
    pub scoring: ScoringWeights,
    pub monte_carlo: MonteCarloSettings,
    pub stochastic: StochasticSettings,
    pub risk: RiskSettings,
}

impl Default for PlannerConfiguration {
    fn default() -> Self {
        PlannerConfiguration {
            name: "default".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_sequences: 0,
            max_plan_attempts: 0,
            max_opportunities_per_category: 0,
            priority_threshold: 0.0,
            prune_infeasible: true,
            allow_buy: true,
            allow_sell: true,
            transaction_costs: TransactionCostModel::default(),
            cost_penalty_factor: DEFAULT_COST_PENALTY_FACTOR,
            filters: FilterSettings::default(),
            scoring: ScoringWeights::default(),
            monte_carlo: MonteCarloSettings::default(),
            stochastic: StochasticSettings::default(),
            risk: RiskSettings::default(),
        }
    }
}

impl PlannerConfiguration {
    pub fn generation_config(&self, available_cash: f64) -> GenerationConfig {
        GenerationConfig {
            max_depth: self.max_depth,
            max_sequences: self.max_sequences,
            available_cash,
            prune_infeasible: self.prune_infeasible,
        }
    }
}

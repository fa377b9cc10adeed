//! Monte Carlo evaluation of a single sequence under random price paths.
//!
//! Each path draws one standard-normal shock per traded symbol and scales
//! that symbol's price by `max(1 + vol * z, 0.01)`. Path `i` is driven by its
//! own generator seeded from `seed + i`, so results do not depend on how
//! rayon schedules the paths.

use std::collections::{BTreeMap, BTreeSet};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::action::ActionCandidate;
use super::context::EvaluationContext;
use super::error::PlannerError;
use super::evaluation::{evaluate_with_price_multipliers, PriceMultipliers};
use super::scoring::SequenceScorer;

pub const DEFAULT_PATHS: usize = 100;
pub const MAX_PATHS: usize = 1000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_VOLATILITY: f64 = 0.2;
const MIN_PRICE_MULTIPLIER: f64 = 0.01;

fn default_paths() -> usize {
    DEFAULT_PATHS
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloRequest {
    pub sequence: Vec<ActionCandidate>,
    #[serde(default)]
    pub symbol_volatilities: BTreeMap<String, f64>,
    pub evaluation_context: EvaluationContext,
    #[serde(default = "default_paths")]
    pub paths: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub paths_evaluated: usize,
    pub avg_score: f64,
    pub worst_score: f64,
    pub best_score: f64,
    pub p10_score: f64,
    pub p90_score: f64,
    /// 0.4 * worst + 0.3 * p10 + 0.3 * avg
    pub final_score: f64,
    /// Share of paths in which the sequence stayed cash-feasible.
    pub feasible_ratio: f64,
}

pub struct MonteCarloEvaluator<'a> {
    scorer: &'a dyn SequenceScorer,
    default_volatility: f64,
}

impl<'a> MonteCarloEvaluator<'a> {
    pub fn new(scorer: &'a dyn SequenceScorer) -> Self {
        MonteCarloEvaluator {
            scorer,
            default_volatility: DEFAULT_VOLATILITY,
        }
    }

    pub fn with_default_volatility(mut self, volatility: f64) -> Self {
        self.default_volatility = volatility;
        self
    }

    pub fn evaluate(&self, request: &MonteCarloRequest) -> Result<MonteCarloResult, PlannerError> {
        if request.paths == 0 || request.paths > MAX_PATHS {
            return Err(PlannerError::invalid_input(format!(
                "paths must be between 1 and {MAX_PATHS}, got {}",
                request.paths
            )));
        }

        let symbols: BTreeSet<&str> = request
            .sequence
            .iter()
            .map(|a| a.symbol.as_str())
            .collect();
        let volatilities: Vec<(&str, f64)> = symbols
            .into_iter()
            .map(|s| {
                let vol = request
                    .symbol_volatilities
                    .get(s)
                    .copied()
                    .unwrap_or(self.default_volatility);
                (s, vol)
            })
            .collect();

        let outcomes: Vec<(f64, bool)> = (0..request.paths)
            .into_par_iter()
            .map(|path| {
                let multipliers = path_multipliers(&volatilities, request.seed, path as u64);
                evaluate_with_price_multipliers(
                    &request.sequence,
                    &request.evaluation_context,
                    self.scorer,
                    &multipliers,
                )
                .map(|r| (r.score, r.feasible))
            })
            .collect::<Result<_, _>>()?;

        let scores: Vec<f64> = outcomes.iter().map(|(s, _)| *s).collect();
        let feasible = outcomes.iter().filter(|(_, f)| *f).count();
        Ok(summarize(&scores, feasible))
    }
}

fn path_multipliers(volatilities: &[(&str, f64)], seed: u64, path: u64) -> PriceMultipliers {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(path));
    volatilities
        .iter()
        .map(|(symbol, vol)| {
            let z: f64 = StandardNormal.sample(&mut rng);
            (symbol.to_string(), (1.0 + vol * z).max(MIN_PRICE_MULTIPLIER))
        })
        .collect()
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    let index = ((sorted.len() as f64 * fraction) as usize).min(sorted.len() - 1);
    sorted[index]
}

fn summarize(scores: &[f64], feasible: usize) -> MonteCarloResult {
    let mut sorted = scores.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    let avg = sorted.iter().sum::<f64>() / n as f64;
    let worst = sorted[0];
    let best = sorted[n - 1];
    let p10 = percentile(&sorted, 0.10);
    let p90 = percentile(&sorted, 0.90);

    MonteCarloResult {
        paths_evaluated: n,
        avg_score: avg,
        worst_score: worst,
        best_score: best,
        p10_score: p10,
        p90_score: p90,
        final_score: 0.4 * worst + 0.3 * p10 + 0.3 * avg,
        feasible_ratio: feasible as f64 / n as f64,
    }
}

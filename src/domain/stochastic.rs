//! Deterministic stress scenarios: every traded symbol's price is shifted by
//! the same fraction, once per scenario.

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::action::ActionCandidate;
use super::context::EvaluationContext;
use super::error::PlannerError;
use super::evaluation::{evaluate_sequence, evaluate_with_price_multipliers, PriceMultipliers};
use super::scoring::SequenceScorer;

pub const DEFAULT_SHIFTS: [f64; 5] = [-0.10, -0.05, 0.0, 0.05, 0.10];

/// Equal weights for `count` scenarios.
pub fn equal_weights(count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    vec![1.0 / count as f64; count]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticRequest {
    pub sequence: Vec<ActionCandidate>,
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub shifts: Vec<f64>,
    pub evaluation_context: EvaluationContext,
}

impl StochasticRequest {
    /// Fill in the default shift ladder and equal weights where omitted.
    pub fn with_defaults(mut self) -> Self {
        if self.shifts.is_empty() {
            self.shifts = DEFAULT_SHIFTS.to_vec();
        }
        if self.weights.is_empty() {
            self.weights = equal_weights(self.shifts.len());
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScore {
    pub shift: f64,
    pub weight: f64,
    pub score: f64,
    pub feasible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticResult {
    pub scenarios: Vec<ScenarioScore>,
    pub base_score: f64,
    pub worst_case: f64,
    pub best_case: f64,
    /// Sum of weight * score over scenarios.
    pub weighted_score: f64,
}

pub fn evaluate_scenarios(
    request: &StochasticRequest,
    scorer: &dyn SequenceScorer,
) -> Result<StochasticResult, PlannerError> {
    if request.shifts.is_empty() {
        return Err(PlannerError::invalid_input("at least one price shift is required"));
    }
    if request.shifts.len() != request.weights.len() {
        return Err(PlannerError::invalid_input(format!(
            "{} shifts but {} weights",
            request.shifts.len(),
            request.weights.len()
        )));
    }
    if let Some(shift) = request.shifts.iter().find(|s| !s.is_finite() || **s <= -1.0) {
        return Err(PlannerError::invalid_input(format!(
            "price shift {shift} would make prices non-positive"
        )));
    }

    let symbols: BTreeSet<&str> = request
        .sequence
        .iter()
        .map(|a| a.symbol.as_str())
        .collect();

    let scenarios: Vec<ScenarioScore> = request
        .shifts
        .par_iter()
        .zip(request.weights.par_iter())
        .map(|(&shift, &weight)| {
            let multipliers: PriceMultipliers =
                symbols.iter().map(|s| (s.to_string(), 1.0 + shift)).collect();
            evaluate_with_price_multipliers(
                &request.sequence,
                &request.evaluation_context,
                scorer,
                &multipliers,
            )
            .map(|r| ScenarioScore {
                shift,
                weight,
                score: r.score,
                feasible: r.feasible,
            })
        })
        .collect::<Result<_, _>>()?;

    let base_score =
        evaluate_sequence(&request.sequence, &request.evaluation_context, scorer)?.score;
    let worst_case = scenarios
        .iter()
        .map(|s| s.score)
        .fold(f64::INFINITY, f64::min);
    let best_case = scenarios
        .iter()
        .map(|s| s.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let weighted_score = scenarios.iter().map(|s| s.weight * s.score).sum();

    Ok(StochasticResult {
        scenarios,
        base_score,
        worst_case,
        best_case,
        weighted_score,
    })
}

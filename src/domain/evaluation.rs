//! Deterministic sequence evaluation.
//!
//! A sequence is simulated against the evaluation snapshot in canonical
//! order. SELLs release `value - cost` into cash; BUYs consume `value + cost`.
//! Running out of cash marks the result infeasible but the simulation and
//! scoring still complete so the result can be inspected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::action::{normalize_actions, sequence_hash, ActionCandidate, TradeSide};
use super::context::{EvaluationContext, PortfolioContext};
use super::error::PlannerError;
use super::scoring::SequenceScorer;

pub const MAX_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_COST_PENALTY_FACTOR: f64 = 0.1;

const CASH_EPSILON: f64 = 1e-9;

/// Per-symbol price multipliers applied before simulation.
pub type PriceMultipliers = HashMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceEvaluationResult {
    pub sequence_hash: String,
    /// End score less the cost penalty. Higher is better.
    pub score: f64,
    pub start_score: f64,
    pub end_score: f64,
    pub feasible: bool,
    pub end_cash: f64,
    pub total_cost: f64,
    pub end_state: PortfolioContext,
}

impl SequenceEvaluationResult {
    fn failed(sequence_hash: String) -> Self {
        SequenceEvaluationResult {
            sequence_hash,
            score: 0.0,
            start_score: 0.0,
            end_score: 0.0,
            feasible: false,
            end_cash: 0.0,
            total_cost: 0.0,
            end_state: PortfolioContext::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvaluationRequest {
    pub sequences: Vec<Vec<ActionCandidate>>,
    pub evaluation_context: EvaluationContext,
}

/// `errors[i]` is empty when `results[i]` evaluated cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvaluationResponse {
    pub results: Vec<SequenceEvaluationResult>,
    pub errors: Vec<String>,
}

impl BatchEvaluationResponse {
    pub fn error_count(&self) -> usize {
        self.errors.iter().filter(|e| !e.is_empty()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preferred {
    First,
    Second,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceComparison {
    pub first: SequenceEvaluationResult,
    pub second: SequenceEvaluationResult,
    pub preferred: Preferred,
}

fn validate_context(ctx: &EvaluationContext) -> Result<(), PlannerError> {
    if !ctx.available_cash_eur.is_finite() || ctx.available_cash_eur < 0.0 {
        return Err(PlannerError::invalid_input(format!(
            "available cash must be a non-negative number, got {}",
            ctx.available_cash_eur
        )));
    }
    if let Some(factor) = ctx.cost_penalty_factor {
        if !factor.is_finite() || factor < 0.0 {
            return Err(PlannerError::invalid_input(format!(
                "cost penalty factor must be non-negative, got {factor}"
            )));
        }
    }
    Ok(())
}

fn validate_action(action: &ActionCandidate, price: f64) -> Result<(), PlannerError> {
    if action.symbol.trim().is_empty() {
        return Err(PlannerError::invalid_input("action has an empty symbol"));
    }
    if action.quantity <= 0 {
        return Err(PlannerError::invalid_input(format!(
            "quantity for {} must be positive, got {}",
            action.symbol, action.quantity
        )));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(PlannerError::invalid_input(format!(
            "price for {} must be a non-negative number, got {}",
            action.symbol, price
        )));
    }
    Ok(())
}

pub fn evaluate_sequence(
    actions: &[ActionCandidate],
    ctx: &EvaluationContext,
    scorer: &dyn SequenceScorer,
) -> Result<SequenceEvaluationResult, PlannerError> {
    evaluate_with_price_multipliers(actions, ctx, scorer, &PriceMultipliers::new())
}

/// Evaluate with each traded symbol's price scaled by its multiplier (1.0 when absent).
pub fn evaluate_with_price_multipliers(
    actions: &[ActionCandidate],
    ctx: &EvaluationContext,
    scorer: &dyn SequenceScorer,
    multipliers: &PriceMultipliers,
) -> Result<SequenceEvaluationResult, PlannerError> {
    validate_context(ctx)?;
    let actions = normalize_actions(actions.to_vec());

    let start = ctx.start_portfolio();
    let start_score = scorer.score(&start);
    let mut end = start.clone();
    let mut cash = ctx.available_cash_eur;
    let mut total_cost = 0.0;
    let mut feasible = true;

    for action in &actions {
        let multiplier = multipliers.get(&action.symbol).copied().unwrap_or(1.0);
        let price = ctx.price_for(action) * multiplier;
        validate_action(action, price)?;

        let value = price * action.quantity as f64;
        let cost = ctx.transaction_costs.cost(value);
        total_cost += cost;

        match action.side {
            TradeSide::Sell => {
                cash += value - cost;
                end.adjust_position(&action.symbol, -value);
            }
            TradeSide::Buy => {
                let required = value + cost;
                if required > cash + CASH_EPSILON {
                    feasible = false;
                }
                cash -= required;
                end.adjust_position(&action.symbol, value);
                register_membership(&mut end, ctx, &action.symbol);
            }
        }
    }

    end.cash = cash;
    end.recompute_total();
    let end_score = scorer.score(&end);
    let penalty_factor = ctx
        .cost_penalty_factor
        .unwrap_or(DEFAULT_COST_PENALTY_FACTOR);
    let score = end_score - penalty_factor * total_cost / start.total_value.max(1.0);

    Ok(SequenceEvaluationResult {
        sequence_hash: sequence_hash(&actions),
        score,
        start_score,
        end_score,
        feasible,
        end_cash: cash,
        total_cost,
        end_state: end,
    })
}

fn register_membership(portfolio: &mut PortfolioContext, ctx: &EvaluationContext, symbol: &str) {
    let Some(security) = ctx.securities.get(symbol) else {
        return;
    };
    if !security.country.is_empty() {
        portfolio
            .security_countries
            .entry(symbol.to_string())
            .or_insert_with(|| security.country.clone());
    }
    if !security.industry.is_empty() {
        portfolio
            .security_industries
            .entry(symbol.to_string())
            .or_insert_with(|| security.industry.clone());
    }
    if let Some(score) = security.quality_score {
        portfolio
            .security_scores
            .entry(symbol.to_string())
            .or_insert(score);
    }
}

/// Evaluate every sequence; a failing sequence records its error and the
/// batch continues. Only an oversized batch is rejected as a whole.
pub fn evaluate_batch(
    sequences: &[Vec<ActionCandidate>],
    ctx: &EvaluationContext,
    scorer: &dyn SequenceScorer,
) -> Result<BatchEvaluationResponse, PlannerError> {
    if sequences.len() > MAX_BATCH_SIZE {
        return Err(PlannerError::invalid_input(format!(
            "batch of {} sequences exceeds the limit of {MAX_BATCH_SIZE}",
            sequences.len()
        )));
    }

    let mut results = Vec::with_capacity(sequences.len());
    let mut errors = Vec::with_capacity(sequences.len());
    for actions in sequences {
        match evaluate_sequence(actions, ctx, scorer) {
            Ok(result) => {
                results.push(result);
                errors.push(String::new());
            }
            Err(e) => {
                let hash = sequence_hash(&normalize_actions(actions.clone()));
                results.push(SequenceEvaluationResult::failed(hash));
                errors.push(e.to_string());
            }
        }
    }
    Ok(BatchEvaluationResponse { results, errors })
}

/// Feasible beats infeasible; otherwise the higher score wins. Ties prefer the first.
pub fn compare_sequences(
    first: &[ActionCandidate],
    second: &[ActionCandidate],
    ctx: &EvaluationContext,
    scorer: &dyn SequenceScorer,
) -> Result<SequenceComparison, PlannerError> {
    let first = evaluate_sequence(first, ctx, scorer)?;
    let second = evaluate_sequence(second, ctx, scorer)?;
    let preferred = match (first.feasible, second.feasible) {
        (true, false) => Preferred::First,
        (false, true) => Preferred::Second,
        _ if second.score > first.score => Preferred::Second,
        _ => Preferred::First,
    };
    Ok(SequenceComparison {
        first,
        second,
        preferred,
    })
}

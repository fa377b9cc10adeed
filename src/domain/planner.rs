//! Holistic plan selection.
//!
//! The planner drives the whole pipeline: constraint enforcement, category
//! limits, exhaustive generation, filtering, batch evaluation and finally
//! selection of the best feasible sequence. Everything it discarded along
//! the way is reported next to the plan so callers can explain the choice.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::action::{ActionCandidate, ActionSequence, TradeSide};
use super::context::{EvaluationContext, OpportunitiesByCategory, OpportunityContext};
use super::error::PlannerError;
use super::evaluation::{evaluate_batch, SequenceEvaluationResult, MAX_BATCH_SIZE};
use super::filter::{FilterContext, FilterPipeline};
use super::generator::{is_cash_feasible, CancellationToken, SequenceGenerator};
use super::planner_config::PlannerConfiguration;
use super::scoring::SequenceScorer;
use crate::ports::feasibility_port::FeasibilityPort;

pub const REASON_NOT_GENERATED: &str = "not selected by sequence generator";
pub const REASON_ALTERNATIVE: &str = "in alternative sequence";
pub const REASON_NOT_TOP: &str = "sequence not in top candidates";
pub const REASON_INFEASIBLE: &str = "infeasible";
pub const REASON_LOWER_SCORE: &str = "lower_score";
const REASON_BELOW_THRESHOLD: &str = "below priority threshold";
const REASON_CATEGORY_LIMIT: &str = "category limit reached";

/// Everything the `plan` command needs, loaded from one JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningSnapshot {
    pub opportunities: OpportunitiesByCategory,
    pub opportunity_context: OpportunityContext,
    pub evaluation_context: EvaluationContext,
    /// Close prices per symbol, oldest first. Feeds the correlation filter.
    #[serde(default)]
    pub price_history: BTreeMap<String, Vec<f64>>,
}

/// A candidate dropped before generation, with every reason it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreFilteredSecurity {
    pub isin: String,
    pub symbol: String,
    pub side: TradeSide,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticStep {
    pub step_number: usize,
    pub side: TradeSide,
    pub isin: String,
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub estimated_price: f64,
    pub estimated_value: f64,
    pub currency: String,
    pub reason: String,
    pub narrative: String,
    pub is_windfall: bool,
    pub is_averaging_down: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticPlan {
    pub steps: Vec<HolisticStep>,
    pub current_score: f64,
    pub end_state_score: f64,
    pub improvement: f64,
    pub cash_required: f64,
    pub cash_generated: f64,
    pub narrative_summary: String,
    pub feasible: bool,
}

impl HolisticPlan {
    pub fn empty() -> Self {
        HolisticPlan {
            steps: Vec::new(),
            current_score: 0.0,
            end_state_score: 0.0,
            improvement: 0.0,
            cash_required: 0.0,
            cash_generated: 0.0,
            narrative_summary: "No actions recommended".to_string(),
            feasible: true,
        }
    }

    fn from_sequence(sequence: &ActionSequence, current: f64, end: f64, feasible: bool) -> Self {
        let steps: Vec<HolisticStep> = sequence
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| HolisticStep {
                step_number: i + 1,
                side: action.side,
                isin: action.isin.clone(),
                symbol: action.symbol.clone(),
                name: action.name.clone(),
                quantity: action.quantity,
                estimated_price: action.price,
                estimated_value: action.value_eur,
                currency: action.currency.clone(),
                reason: action.reason.clone(),
                narrative: format!(
                    "Step {}: {} {} shares of {}",
                    i + 1,
                    action.side,
                    action.quantity,
                    action.symbol
                ),
                is_windfall: action.is_windfall(),
                is_averaging_down: action.is_averaging_down(),
            })
            .collect();

        let cash_generated = sequence.sells().map(|a| a.value_eur).sum();
        let cash_required = sequence.buys().map(|a| a.value_eur).sum();
        let narrative_summary = if steps.is_empty() {
            "No actions recommended".to_string()
        } else {
            let legs: Vec<String> = sequence
                .actions
                .iter()
                .map(|a| format!("{} {} {}", a.side, a.quantity, a.symbol))
                .collect();
            format!("{} step plan: {}", steps.len(), legs.join(", "))
        };

        HolisticPlan {
            steps,
            current_score: current,
            end_state_score: end,
            improvement: end - current,
            cash_required,
            cash_generated,
            narrative_summary,
            feasible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedOpportunity {
    pub side: TradeSide,
    pub symbol: String,
    pub isin: String,
    pub priority: f64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSequence {
    pub rank: usize,
    pub actions: Vec<ActionCandidate>,
    pub score: f64,
    pub feasible: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub plan: HolisticPlan,
    pub rejected_opportunities: Vec<RejectedOpportunity>,
    pub rejected_sequences: Vec<RejectedSequence>,
    pub pre_filtered: Vec<PreFilteredSecurity>,
}

pub struct HolisticPlanner<'a> {
    feasibility: &'a dyn FeasibilityPort,
    scorer: &'a dyn SequenceScorer,
    filters: FilterPipeline,
    filter_ctx: Option<FilterContext>,
    cancel: Option<CancellationToken>,
}

impl<'a> HolisticPlanner<'a> {
    pub fn new(feasibility: &'a dyn FeasibilityPort, scorer: &'a dyn SequenceScorer) -> Self {
        HolisticPlanner {
            feasibility,
            scorer,
            filters: FilterPipeline::new(),
            filter_ctx: None,
            cancel: None,
        }
    }

    /// Without a filter context the filters see only the evaluation
    /// context's securities and no correlations.
    pub fn with_filters(mut self, filters: FilterPipeline, ctx: Option<FilterContext>) -> Self {
        self.filters = filters;
        self.filter_ctx = ctx;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn create_plan(
        &self,
        opportunities: &OpportunitiesByCategory,
        opportunity_ctx: &OpportunityContext,
        eval_ctx: &EvaluationContext,
        config: &PlannerConfiguration,
    ) -> Result<PlanResult, PlannerError> {
        let opportunity_ctx = apply_config_to_opportunities(opportunity_ctx, config);
        let eval_ctx = apply_config_to_evaluation(eval_ctx, config);
        let mut pre_filtered = PreFilterLog::default();

        let enforced = self.enforce(opportunities, &opportunity_ctx, &mut pre_filtered);
        let limited = limit_categories(enforced, config, &mut pre_filtered);
        let identified: Vec<ActionCandidate> = limited.values().flatten().cloned().collect();
        info!(candidates = identified.len(), "opportunities ready for generation");

        let mut generator = SequenceGenerator::new(self.feasibility).with_progress(
            |depth, total, message: &str| info!(depth, total, "{message}"),
        );
        if let Some(token) = &self.cancel {
            generator = generator.with_cancellation(token.clone());
        }
        let generation = config.generation_config(opportunity_ctx.available_cash_eur);
        let outcome = generator.generate(&limited, &opportunity_ctx, &generation);
        for rejected in &outcome.rejected {
            pre_filtered.record(&rejected.candidate, &rejected.reason);
        }

        let filter_ctx = self
            .filter_ctx
            .clone()
            .unwrap_or_else(|| FilterContext::new(eval_ctx.securities.clone()));
        let sequences = self.filters.apply(outcome.sequences, &filter_ctx);
        info!(sequences = sequences.len(), "sequences after filtering");

        if sequences.is_empty() {
            return Ok(PlanResult {
                plan: HolisticPlan::empty(),
                rejected_opportunities: rejected_opportunities(&identified, &[], &[], None),
                rejected_sequences: Vec::new(),
                pre_filtered: pre_filtered.finish(),
            });
        }

        let (results, errors) = self.evaluate_all(&sequences, &eval_ctx)?;
        let error_count = errors.iter().filter(|e| !e.is_empty()).count();
        if error_count == sequences.len() {
            warn!(
                sequences = sequences.len(),
                "every sequence failed evaluation, falling back to priority selection"
            );
            return Ok(priority_fallback(
                &sequences,
                &identified,
                eval_ctx.available_cash_eur,
                pre_filtered.finish(),
            ));
        }
        if error_count > 0 {
            warn!(errors = error_count, "some sequences failed evaluation");
        }

        let mut best: Vec<usize> = (0..sequences.len())
            .filter(|&i| errors[i].is_empty() && results[i].feasible)
            .collect();
        best.sort_by(|&a, &b| {
            results[b]
                .score
                .total_cmp(&results[a].score)
                .then_with(|| results[a].sequence_hash.cmp(&results[b].sequence_hash))
        });
        if config.max_plan_attempts > 0 {
            best.truncate(config.max_plan_attempts);
        }
        let Some(&winner) = best.first() else {
            return Err(PlannerError::NoValidSequence);
        };

        let result = &results[winner];
        info!(
            hash = %result.sequence_hash,
            score = result.score,
            steps = sequences[winner].actions.len(),
            "plan selected"
        );
        let plan = HolisticPlan::from_sequence(
            &sequences[winner],
            result.start_score,
            result.end_score,
            result.feasible,
        );
        let top: Vec<&ActionSequence> = best.iter().map(|&i| &sequences[i]).collect();

        Ok(PlanResult {
            plan,
            rejected_opportunities: rejected_opportunities(
                &identified,
                &sequences,
                &top,
                Some(&sequences[winner]),
            ),
            rejected_sequences: rejected_sequences(&sequences, &results, &errors, winner),
            pre_filtered: pre_filtered.finish(),
        })
    }

    fn enforce(
        &self,
        opportunities: &OpportunitiesByCategory,
        ctx: &OpportunityContext,
        log: &mut PreFilterLog,
    ) -> OpportunitiesByCategory {
        opportunities
            .iter()
            .map(|(category, candidates)| {
                let (kept, dropped) = self.feasibility.enforce(candidates, ctx);
                for entry in dropped {
                    log.merge(entry);
                }
                (*category, kept)
            })
            .collect()
    }

    fn evaluate_all(
        &self,
        sequences: &[ActionSequence],
        ctx: &EvaluationContext,
    ) -> Result<(Vec<SequenceEvaluationResult>, Vec<String>), PlannerError> {
        let mut results = Vec::with_capacity(sequences.len());
        let mut errors = Vec::with_capacity(sequences.len());
        for chunk in sequences.chunks(MAX_BATCH_SIZE) {
            let actions: Vec<Vec<ActionCandidate>> =
                chunk.iter().map(|s| s.actions.clone()).collect();
            let response = evaluate_batch(&actions, ctx, self.scorer)?;
            debug!(
                evaluated = response.results.len(),
                errors = response.error_count(),
                "batch evaluated"
            );
            results.extend(response.results);
            errors.extend(response.errors);
        }
        Ok((results, errors))
    }
}

fn apply_config_to_opportunities(
    ctx: &OpportunityContext,
    config: &PlannerConfiguration,
) -> OpportunityContext {
    let mut ctx = ctx.clone();
    ctx.allow_buy = ctx.allow_buy && config.allow_buy;
    ctx.allow_sell = ctx.allow_sell && config.allow_sell;
    ctx.transaction_costs = config.transaction_costs;
    ctx
}

fn apply_config_to_evaluation(
    ctx: &EvaluationContext,
    config: &PlannerConfiguration,
) -> EvaluationContext {
    let mut ctx = ctx.clone();
    ctx.transaction_costs = config.transaction_costs;
    ctx.cost_penalty_factor = Some(config.cost_penalty_factor);
    ctx
}

/// Drop candidates under the priority threshold, then keep the top N per category.
fn limit_categories(
    opportunities: OpportunitiesByCategory,
    config: &PlannerConfiguration,
    log: &mut PreFilterLog,
) -> OpportunitiesByCategory {
    opportunities
        .into_iter()
        .map(|(category, candidates)| {
            let (mut kept, below): (Vec<_>, Vec<_>) = candidates
                .into_iter()
                .partition(|c| c.priority >= config.priority_threshold);
            for candidate in &below {
                log.record(candidate, REASON_BELOW_THRESHOLD);
            }
            kept.sort_by(|a, b| b.priority.total_cmp(&a.priority));
            let limit = config.max_opportunities_per_category;
            if limit > 0 && kept.len() > limit {
                for candidate in kept.drain(limit..) {
                    log.record(&candidate, REASON_CATEGORY_LIMIT);
                }
            }
            (category, kept)
        })
        .collect()
}

/// Pre-filter entries merged by (isin, side) with sorted, unique reasons.
#[derive(Default)]
struct PreFilterLog {
    entries: BTreeMap<(String, TradeSide), (String, BTreeSet<String>)>,
}

impl PreFilterLog {
    fn record(&mut self, candidate: &ActionCandidate, reason: &str) {
        let entry = self
            .entries
            .entry((candidate.isin.clone(), candidate.side))
            .or_insert_with(|| (candidate.symbol.clone(), BTreeSet::new()));
        entry.1.insert(reason.to_string());
    }

    fn merge(&mut self, security: PreFilteredSecurity) {
        let entry = self
            .entries
            .entry((security.isin, security.side))
            .or_insert_with(|| (security.symbol, BTreeSet::new()));
        entry.1.extend(security.reasons);
    }

    fn finish(self) -> Vec<PreFilteredSecurity> {
        self.entries
            .into_iter()
            .map(|((isin, side), (symbol, reasons))| PreFilteredSecurity {
                isin,
                symbol,
                side,
                reasons: reasons.into_iter().collect(),
            })
            .collect()
    }
}

fn keys_of<'s>(sequences: impl IntoIterator<Item = &'s ActionSequence>) -> HashSet<String> {
    sequences
        .into_iter()
        .flat_map(|s| s.actions.iter().map(ActionCandidate::opportunity_key))
        .collect()
}

fn rejected_opportunities(
    identified: &[ActionCandidate],
    generated: &[ActionSequence],
    top: &[&ActionSequence],
    selected: Option<&ActionSequence>,
) -> Vec<RejectedOpportunity> {
    let generated_keys = keys_of(generated);
    let top_keys = keys_of(top.iter().copied());
    let selected_keys = keys_of(selected);

    let mut rejected: BTreeMap<(String, TradeSide), RejectedOpportunity> = BTreeMap::new();
    for candidate in identified {
        let key = candidate.opportunity_key();
        if selected_keys.contains(&key) {
            continue;
        }
        let reason = if !generated_keys.contains(&key) {
            REASON_NOT_GENERATED
        } else if top_keys.contains(&key) {
            REASON_ALTERNATIVE
        } else {
            REASON_NOT_TOP
        };
        let entry = rejected
            .entry((candidate.symbol.clone(), candidate.side))
            .or_insert_with(|| RejectedOpportunity {
                side: candidate.side,
                symbol: candidate.symbol.clone(),
                isin: candidate.isin.clone(),
                priority: candidate.priority,
                reasons: Vec::new(),
            });
        if !entry.reasons.iter().any(|r| r == reason) {
            entry.reasons.push(reason.to_string());
            entry.reasons.sort();
        }
    }
    rejected.into_values().collect()
}

fn rejected_sequences(
    sequences: &[ActionSequence],
    results: &[SequenceEvaluationResult],
    errors: &[String],
    winner: usize,
) -> Vec<RejectedSequence> {
    let mut order: Vec<usize> = (0..sequences.len()).filter(|&i| i != winner).collect();
    let feasible = |i: usize| errors[i].is_empty() && results[i].feasible;
    order.sort_by(|&a, &b| {
        feasible(b)
            .cmp(&feasible(a))
            .then_with(|| results[b].score.total_cmp(&results[a].score))
            .then_with(|| results[a].sequence_hash.cmp(&results[b].sequence_hash))
    });
    order
        .into_iter()
        .enumerate()
        .map(|(rank, i)| RejectedSequence {
            rank: rank + 1,
            actions: sequences[i].actions.clone(),
            score: results[i].score,
            feasible: feasible(i),
            reason: if feasible(i) {
                REASON_LOWER_SCORE.to_string()
            } else {
                REASON_INFEASIBLE.to_string()
            },
        })
        .collect()
}

/// Highest-priority sequence with zero scores; the first wins on ties.
fn priority_fallback(
    sequences: &[ActionSequence],
    identified: &[ActionCandidate],
    available_cash: f64,
    pre_filtered: Vec<PreFilteredSecurity>,
) -> PlanResult {
    let Some(chosen) = sequences
        .iter()
        .fold(None::<&ActionSequence>, |best, s| match best {
            Some(b) if b.priority >= s.priority => Some(b),
            _ => Some(s),
        })
    else {
        return PlanResult {
            plan: HolisticPlan::empty(),
            rejected_opportunities: rejected_opportunities(identified, &[], &[], None),
            rejected_sequences: Vec::new(),
            pre_filtered,
        };
    };
    let feasible = is_cash_feasible(&chosen.actions, available_cash);
    PlanResult {
        plan: HolisticPlan::from_sequence(chosen, 0.0, 0.0, feasible),
        rejected_opportunities: rejected_opportunities(identified, sequences, &[], Some(chosen)),
        rejected_sequences: Vec::new(),
        pre_filtered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::TAG_WINDFALL;
    use crate::domain::context::OpportunityCategory;
    use crate::domain::scoring::AllocationFitScorer;

    struct AllowAll;

    impl FeasibilityPort for AllowAll {
        fn is_action_feasible(
            &self,
            _: &ActionCandidate,
            _: &OpportunityContext,
        ) -> (bool, String) {
            (true, String::new())
        }
    }

    struct RejectSymbol(&'static str);

    impl FeasibilityPort for RejectSymbol {
        fn is_action_feasible(
            &self,
            c: &ActionCandidate,
            _: &OpportunityContext,
        ) -> (bool, String) {
            if c.symbol == self.0 {
                (false, "ineligible".to_string())
            } else {
                (true, String::new())
            }
        }
    }

    fn make_candidate(
        side: TradeSide,
        symbol: &str,
        quantity: i64,
        price: f64,
        priority: f64,
    ) -> ActionCandidate {
        ActionCandidate {
            side,
            isin: format!("ISIN_{symbol}"),
            symbol: symbol.to_string(),
            name: format!("{symbol} Inc"),
            quantity,
            price,
            value_eur: quantity as f64 * price,
            currency: "EUR".to_string(),
            reason: "rebalance".to_string(),
            priority,
            tags: vec![],
        }
    }

    fn make_opportunities() -> OpportunitiesByCategory {
        let mut opportunities = OpportunitiesByCategory::new();
        opportunities.insert(
            OpportunityCategory::RebalanceSells,
            vec![make_candidate(TradeSide::Sell, "AAPL", 5, 100.0, 0.8)],
        );
        opportunities.insert(
            OpportunityCategory::RebalanceBuys,
            vec![make_candidate(TradeSide::Buy, "GOOGL", 3, 100.0, 0.6)],
        );
        opportunities
    }

    fn make_eval_context(cash: f64) -> EvaluationContext {
        let mut ctx = EvaluationContext::new(cash);
        ctx.portfolio.positions.insert("AAPL".into(), 1000.0);
        ctx.portfolio.optimizer_targets.insert("AAPL".into(), 0.5);
        ctx.portfolio.optimizer_targets.insert("GOOGL".into(), 0.5);
        ctx
    }

    fn plan(
        feasibility: &dyn FeasibilityPort,
        opportunities: &OpportunitiesByCategory,
        cash: f64,
        config: &PlannerConfiguration,
    ) -> Result<PlanResult, PlannerError> {
        let scorer = AllocationFitScorer::default();
        HolisticPlanner::new(feasibility, &scorer).create_plan(
            opportunities,
            &OpportunityContext::new(cash),
            &make_eval_context(cash),
            config,
        )
    }

    fn plan_with_defaults(
        feasibility: &dyn FeasibilityPort,
        opportunities: &OpportunitiesByCategory,
        cash: f64,
    ) -> Result<PlanResult, PlannerError> {
        plan(feasibility, opportunities, cash, &PlannerConfiguration::default())
    }

    #[test]
    fn rebalancing_pair_is_selected() {
        let result = plan_with_defaults(&AllowAll, &make_opportunities(), 1000.0).unwrap();
        let plan = &result.plan;
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].side, TradeSide::Sell);
        assert_eq!(plan.steps[0].narrative, "Step 1: SELL 5 shares of AAPL");
        assert_eq!(plan.steps[1].narrative, "Step 2: BUY 3 shares of GOOGL");
        assert!(plan.feasible);
        assert!(plan.improvement > 0.0);
        assert!((plan.cash_generated - 500.0).abs() < 1e-9);
        assert!((plan.cash_required - 300.0).abs() < 1e-9);
        assert!(result.rejected_opportunities.is_empty());
        assert_eq!(result.rejected_sequences.len(), 2);
        assert!(result.rejected_sequences.iter().all(|s| s.reason == REASON_LOWER_SCORE));
        assert_eq!(result.rejected_sequences[0].rank, 1);
    }

    #[test]
    fn rejected_sequences_ranked_by_score() {
        let result = plan_with_defaults(&AllowAll, &make_opportunities(), 1000.0).unwrap();
        let scores: Vec<f64> = result.rejected_sequences.iter().map(|s| s.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn no_candidates_yields_empty_plan() {
        let opportunities = OpportunitiesByCategory::new();
        let result = plan_with_defaults(&AllowAll, &opportunities, 1000.0).unwrap();
        assert_eq!(result.plan, HolisticPlan::empty());
        assert!(result.plan.feasible);
    }

    #[test]
    fn infeasible_candidates_are_pre_filtered() {
        let result =
            plan_with_defaults(&RejectSymbol("AAPL"), &make_opportunities(), 1000.0).unwrap();
        assert_eq!(result.plan.steps.len(), 1);
        assert_eq!(result.pre_filtered.len(), 1);
        assert_eq!(result.pre_filtered[0].symbol, "AAPL");
        assert_eq!(result.pre_filtered[0].reasons, vec!["ineligible".to_string()]);
    }

    #[test]
    fn only_infeasible_sequences_is_an_error() {
        let mut opportunities = OpportunitiesByCategory::new();
        opportunities.insert(
            OpportunityCategory::OpportunityBuys,
            vec![make_candidate(TradeSide::Buy, "GOOGL", 3, 100.0, 0.6)],
        );
        let err = plan_with_defaults(&AllowAll, &opportunities, 0.0).unwrap_err();
        assert!(matches!(err, PlannerError::NoValidSequence));
    }

    #[test]
    fn evaluation_failures_fall_back_to_priority() {
        let mut opportunities = OpportunitiesByCategory::new();
        opportunities.insert(
            OpportunityCategory::OpportunityBuys,
            vec![
                make_candidate(TradeSide::Buy, "LOW", 0, 10.0, 0.2),
                make_candidate(TradeSide::Buy, "HIGH", 0, 10.0, 0.9),
            ],
        );
        let result = plan_with_defaults(&AllowAll, &opportunities, 1000.0).unwrap();
        assert_eq!(result.plan.steps.len(), 1);
        assert_eq!(result.plan.steps[0].symbol, "HIGH");
        assert_eq!(result.plan.current_score, 0.0);
        assert_eq!(result.plan.end_state_score, 0.0);
    }

    #[test]
    fn threshold_and_category_limit_drop_candidates() {
        let mut opportunities = OpportunitiesByCategory::new();
        opportunities.insert(
            OpportunityCategory::OpportunityBuys,
            vec![
                make_candidate(TradeSide::Buy, "A", 1, 10.0, 0.9),
                make_candidate(TradeSide::Buy, "B", 1, 10.0, 0.7),
                make_candidate(TradeSide::Buy, "C", 1, 10.0, 0.1),
            ],
        );
        let config = PlannerConfiguration {
            priority_threshold: 0.5,
            max_opportunities_per_category: 1,
            ..PlannerConfiguration::default()
        };
        let result = plan(&AllowAll, &opportunities, 1000.0, &config).unwrap();
        assert_eq!(result.plan.steps.len(), 1);
        assert_eq!(result.plan.steps[0].symbol, "A");
        let reasons: BTreeMap<&str, &Vec<String>> = result
            .pre_filtered
            .iter()
            .map(|p| (p.symbol.as_str(), &p.reasons))
            .collect();
        assert_eq!(reasons["B"], &vec![REASON_CATEGORY_LIMIT.to_string()]);
        assert_eq!(reasons["C"], &vec![REASON_BELOW_THRESHOLD.to_string()]);
    }

    #[test]
    fn unselected_opportunity_reasons() {
        let sell = make_candidate(TradeSide::Sell, "AAPL", 5, 100.0, 0.8);
        let buy = make_candidate(TradeSide::Buy, "GOOGL", 3, 100.0, 0.6);
        let extra = make_candidate(TradeSide::Buy, "MSFT", 1, 10.0, 0.1);
        let winner = ActionSequence::new(vec![sell.clone()], "exhaustive");
        let alternative = ActionSequence::new(vec![buy.clone()], "exhaustive");
        let generated = vec![winner.clone(), alternative.clone()];

        let rejected = rejected_opportunities(
            &[sell.clone(), buy.clone(), extra.clone()],
            &generated,
            &[&winner, &alternative],
            Some(&winner),
        );
        assert_eq!(rejected.len(), 2);
        assert_eq!(rejected[0].symbol, "GOOGL");
        assert_eq!(rejected[0].reasons, vec![REASON_ALTERNATIVE.to_string()]);
        assert_eq!(rejected[1].symbol, "MSFT");
        assert_eq!(rejected[1].reasons, vec![REASON_NOT_GENERATED.to_string()]);

        let rejected = rejected_opportunities(&[sell, buy], &generated, &[&winner], Some(&winner));
        assert_eq!(rejected[0].reasons, vec![REASON_NOT_TOP.to_string()]);
    }

    #[test]
    fn windfall_tag_reaches_plan_step() {
        let mut candidate = make_candidate(TradeSide::Sell, "AAPL", 5, 100.0, 0.8);
        candidate.tags.push(TAG_WINDFALL.to_string());
        let sequence = ActionSequence::new(vec![candidate], "exhaustive");
        let plan = HolisticPlan::from_sequence(&sequence, 0.4, 0.5, true);
        assert!(plan.steps[0].is_windfall);
        assert!(!plan.steps[0].is_averaging_down);
        assert!((plan.improvement - 0.1).abs() < 1e-12);
    }

    #[test]
    fn max_plan_attempts_limits_top_set() {
        let config = PlannerConfiguration {
            max_plan_attempts: 1,
            ..PlannerConfiguration::default()
        };
        let result = plan(&AllowAll, &make_opportunities(), 1000.0, &config).unwrap();
        assert_eq!(result.plan.steps.len(), 2);
        assert_eq!(result.rejected_sequences.len(), 2);
    }
}

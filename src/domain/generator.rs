//! Exhaustive sequence generation.
//!
//! Every combination of feasible candidates up to the configured depth is
//! normalized, hashed, deduplicated and optionally cash-pruned. Depths are
//! processed in ascending order; progress is reported and cancellation is
//! checked once per depth.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use super::action::{ActionCandidate, ActionSequence, TradeSide};
use super::context::{OpportunitiesByCategory, OpportunityContext};
use crate::ports::feasibility_port::FeasibilityPort;

pub const DEFAULT_MAX_DEPTH: usize = 8;
pub const PATTERN_EXHAUSTIVE: &str = "exhaustive";

/// Tolerance when comparing a BUY value against the running cash balance.
const CASH_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_depth: usize,
    /// Zero means unlimited.
    pub max_sequences: usize,
    pub available_cash: f64,
    pub prune_infeasible: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            max_depth: DEFAULT_MAX_DEPTH,
            max_sequences: 0,
            available_cash: 0.0,
            prune_infeasible: true,
        }
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    MaxSequences,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub candidate: ActionCandidate,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub sequences: Vec<ActionSequence>,
    /// Candidates that passed the feasibility check, in priority order.
    pub candidates: Vec<ActionCandidate>,
    pub rejected: Vec<RejectedCandidate>,
    pub depth_completed: usize,
    pub stop_reason: Option<StopReason>,
}

/// Synchronous progress sink: (completed depth, effective max depth, message).
pub type ProgressCallback<'a> = Box<dyn FnMut(usize, usize, &str) + 'a>;

pub struct SequenceGenerator<'a> {
    feasibility: &'a dyn FeasibilityPort,
    progress: Option<ProgressCallback<'a>>,
    cancel: Option<CancellationToken>,
}

impl<'a> SequenceGenerator<'a> {
    pub fn new(feasibility: &'a dyn FeasibilityPort) -> Self {
        SequenceGenerator {
            feasibility,
            progress: None,
            cancel: None,
        }
    }

    pub fn with_progress(mut self, callback: impl FnMut(usize, usize, &str) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn generate(
        &mut self,
        opportunities: &OpportunitiesByCategory,
        ctx: &OpportunityContext,
        config: &GenerationConfig,
    ) -> GenerationOutcome {
        let (candidates, rejected) = self.collect_candidates(opportunities, ctx);
        let mut outcome = GenerationOutcome {
            sequences: Vec::new(),
            candidates,
            rejected,
            depth_completed: 0,
            stop_reason: None,
        };

        let n = outcome.candidates.len();
        if n == 0 {
            info!("no feasible candidates, nothing to generate");
            return outcome;
        }

        let effective_depth = config.max_depth.min(n);
        let prune = config.prune_infeasible && config.available_cash > 0.0;
        let mut seen: HashSet<String> = HashSet::new();

        for depth in 1..=effective_depth {
            if self.is_cancelled() {
                info!(depth, "generation cancelled");
                outcome.stop_reason = Some(StopReason::Cancelled);
                return outcome;
            }

            let mut emitted_at_depth = 0usize;
            for combo in Combinations::new(n, depth) {
                let actions: Vec<ActionCandidate> = combo
                    .iter()
                    .map(|&i| outcome.candidates[i].clone())
                    .collect();
                if has_repeated_leg(&actions) {
                    continue;
                }

                let sequence = ActionSequence::new(actions, PATTERN_EXHAUSTIVE);
                if !seen.insert(sequence.sequence_hash.clone()) {
                    continue;
                }
                if prune && !is_cash_feasible(&sequence.actions, config.available_cash) {
                    continue;
                }

                outcome.sequences.push(sequence);
                emitted_at_depth += 1;

                if config.max_sequences > 0 && outcome.sequences.len() >= config.max_sequences {
                    info!(
                        depth,
                        sequences = outcome.sequences.len(),
                        "max sequences reached, stopping early"
                    );
                    outcome.stop_reason = Some(StopReason::MaxSequences);
                    return outcome;
                }
            }

            outcome.depth_completed = depth;
            let message = format!(
                "depth {depth}/{effective_depth}: {emitted_at_depth} new sequences ({} total)",
                outcome.sequences.len()
            );
            debug!(depth, emitted = emitted_at_depth, "depth completed");
            if let Some(callback) = self.progress.as_mut() {
                callback(depth, effective_depth, &message);
            }
        }

        info!(
            candidates = n,
            sequences = outcome.sequences.len(),
            depth = outcome.depth_completed,
            "sequence generation finished"
        );
        outcome
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    fn collect_candidates(
        &self,
        opportunities: &OpportunitiesByCategory,
        ctx: &OpportunityContext,
    ) -> (Vec<ActionCandidate>, Vec<RejectedCandidate>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        for (category, candidates) in opportunities {
            for candidate in candidates {
                let (feasible, reason) = self.feasibility.is_action_feasible(candidate, ctx);
                if feasible {
                    accepted.push(candidate.clone());
                } else {
                    debug!(
                        ?category,
                        symbol = %candidate.symbol,
                        side = %candidate.side,
                        reason = %reason,
                        "candidate rejected"
                    );
                    rejected.push(RejectedCandidate {
                        candidate: candidate.clone(),
                        reason,
                    });
                }
            }
        }
        // Stable: equal priorities keep category order.
        accepted.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        (accepted, rejected)
    }
}

/// True if two actions trade the same ISIN on the same side.
fn has_repeated_leg(actions: &[ActionCandidate]) -> bool {
    let mut legs: HashSet<(&str, TradeSide)> = HashSet::with_capacity(actions.len());
    actions
        .iter()
        .any(|a| !legs.insert((a.isin.as_str(), a.side)))
}

/// Walk normalized actions left to right; a BUY may never exceed running cash.
pub fn is_cash_feasible(actions: &[ActionCandidate], available_cash: f64) -> bool {
    let mut cash = available_cash;
    for action in actions {
        match action.side {
            TradeSide::Sell => cash += action.value_eur,
            TradeSide::Buy => {
                if action.value_eur > cash + CASH_EPSILON {
                    return false;
                }
                cash -= action.value_eur;
            }
        }
    }
    true
}

/// Lexicographic k-combinations of `0..n` as index vectors.
#[derive(Debug, Clone)]
pub struct Combinations {
    n: usize,
    k: usize,
    indices: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(n: usize, k: usize) -> Self {
        Combinations {
            n,
            k,
            indices: (0..k).collect(),
            done: k == 0 || k > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let current = self.indices.clone();

        // Rightmost index that can still move right.
        match (0..self.k)
            .rev()
            .find(|&i| self.indices[i] != i + self.n - self.k)
        {
            Some(i) => {
                self.indices[i] += 1;
                for j in (i + 1)..self.k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(current)
    }
}

//! Per-candidate feasibility port.

use crate::domain::action::ActionCandidate;
use crate::domain::context::OpportunityContext;
use crate::domain::planner::PreFilteredSecurity;

/// Fast per-candidate check applied before sequence generation.
///
/// Returns whether the candidate may be traded and, when it may not, a
/// short human-readable reason.
pub trait FeasibilityPort {
    fn is_action_feasible(
        &self,
        candidate: &ActionCandidate,
        ctx: &OpportunityContext,
    ) -> (bool, String);

    /// Adjust a category's candidates to tradable form, reporting the ones
    /// that were dropped. The default keeps every candidate unchanged.
    fn enforce(
        &self,
        candidates: &[ActionCandidate],
        _ctx: &OpportunityContext,
    ) -> (Vec<ActionCandidate>, Vec<PreFilteredSecurity>) {
        (candidates.to_vec(), Vec::new())
    }
}

//! Input snapshot port.

use std::path::Path;

use crate::domain::error::PlannerError;
use crate::domain::evaluation::BatchEvaluationRequest;
use crate::domain::monte_carlo::MonteCarloRequest;
use crate::domain::planner::PlanningSnapshot;
use crate::domain::stochastic::StochasticRequest;

/// Loads the documents each command works from.
pub trait SnapshotPort {
    fn load_planning(&self, path: &Path) -> Result<PlanningSnapshot, PlannerError>;
    fn load_batch(&self, path: &Path) -> Result<BatchEvaluationRequest, PlannerError>;
    fn load_monte_carlo(&self, path: &Path) -> Result<MonteCarloRequest, PlannerError>;
    fn load_stochastic(&self, path: &Path) -> Result<StochasticRequest, PlannerError>;
}

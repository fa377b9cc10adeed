//! JSON file snapshot adapter.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::domain::error::PlannerError;
use crate::domain::evaluation::BatchEvaluationRequest;
use crate::domain::monte_carlo::MonteCarloRequest;
use crate::domain::planner::PlanningSnapshot;
use crate::domain::stochastic::StochasticRequest;
use crate::ports::snapshot_port::SnapshotPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSnapshotAdapter;

impl JsonSnapshotAdapter {
    pub fn new() -> Self {
        JsonSnapshotAdapter
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<T, PlannerError> {
        let snapshot_error = |reason: String| PlannerError::Snapshot {
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| snapshot_error(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| snapshot_error(e.to_string()))
    }
}

impl SnapshotPort for JsonSnapshotAdapter {
    fn load_planning(&self, path: &Path) -> Result<PlanningSnapshot, PlannerError> {
        Self::read(path)
    }

    fn load_batch(&self, path: &Path) -> Result<BatchEvaluationRequest, PlannerError> {
        Self::read(path)
    }

    fn load_monte_carlo(&self, path: &Path) -> Result<MonteCarloRequest, PlannerError> {
        Self::read(path)
    }

    fn load_stochastic(&self, path: &Path) -> Result<StochasticRequest, PlannerError> {
        Self::read(path).map(StochasticRequest::with_defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::action::TradeSide;
    use crate::domain::context::OpportunityCategory;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    const EMPTY_REQUEST: &str =
        r#"{"sequence": [], "evaluation_context": {"available_cash_eur": 10.0}}"#;

    const SNAPSHOT: &str = r#"{
        "opportunities": {
            "rebalance_sells": [
                {"side": "SELL", "isin": "US0378331005", "symbol": "AAPL",
                 "quantity": 5, "price": 100.0, "value_eur": 500.0, "priority": 0.8}
            ]
        },
        "opportunity_context": {
            "available_cash_eur": 1000.0,
            "recently_sold": ["US5949181045"]
        },
        "evaluation_context": {
            "available_cash_eur": 1000.0,
            "transaction_cost_fixed": 1.0
        }
    }"#;

    #[test]
    fn planning_snapshot_uses_defaults() {
        let file = write_temp(SNAPSHOT);
        let snapshot = JsonSnapshotAdapter.load_planning(file.path()).unwrap();
        let sells = &snapshot.opportunities[&OpportunityCategory::RebalanceSells];
        assert_eq!(sells[0].side, TradeSide::Sell);
        assert_eq!(sells[0].quantity, 5);
        assert!(sells[0].tags.is_empty());
        assert!(snapshot.opportunity_context.allow_buy);
        assert!(snapshot.opportunity_context.recently_sold.contains("US5949181045"));
        assert_eq!(snapshot.evaluation_context.transaction_costs.fixed, 1.0);
        assert_eq!(snapshot.evaluation_context.transaction_costs.percent, 0.002);
        assert!(snapshot.price_history.is_empty());
    }

    #[test]
    fn stochastic_request_gets_default_shifts() {
        let file = write_temp(EMPTY_REQUEST);
        let request = JsonSnapshotAdapter.load_stochastic(file.path()).unwrap();
        assert_eq!(request.shifts.len(), 5);
        assert_eq!(request.weights.len(), 5);
    }

    #[test]
    fn monte_carlo_request_defaults() {
        let file = write_temp(EMPTY_REQUEST);
        let request = JsonSnapshotAdapter.load_monte_carlo(file.path()).unwrap();
        assert_eq!(request.paths, 100);
        assert_eq!(request.seed, 42);
    }

    #[test]
    fn malformed_json_is_a_snapshot_error() {
        let file = write_temp("{ not json");
        let err = JsonSnapshotAdapter.load_batch(file.path()).unwrap_err();
        assert!(matches!(err, PlannerError::Snapshot { .. }));
    }

    #[test]
    fn missing_file_is_a_snapshot_error() {
        let err = JsonSnapshotAdapter
            .load_planning(Path::new("/nonexistent/snapshot.json"))
            .unwrap_err();
        assert!(matches!(
            err,
            PlannerError::Snapshot { path, .. } if path.contains("snapshot.json")
        ));
    }
}

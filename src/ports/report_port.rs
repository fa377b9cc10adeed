//! Report output port.

use crate::domain::error::PlannerError;

/// Port for writing command results.
pub trait ReportPort {
    /// Write `report` to `output_path`, or to stdout when no path is given.
    fn write(&self, report: &serde_json::Value, output_path: Option<&str>)
        -> Result<(), PlannerError>;
}

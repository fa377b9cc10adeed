//! Pretty JSON report adapter.

use std::fs;
use std::io::Write;

use tracing::info;

use crate::domain::error::PlannerError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        JsonReportAdapter
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(
        &self,
        report: &serde_json::Value,
        output_path: Option<&str>,
    ) -> Result<(), PlannerError> {
        let rendered = serde_json::to_string_pretty(report)?;
        match output_path {
            Some(path) => {
                fs::write(path, format!("{rendered}\n"))?;
                info!(path, "report written");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{rendered}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn writes_pretty_json_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        let path_str = path.to_str().unwrap();

        JsonReportAdapter
            .write(&json!({"score": 0.5, "steps": []}), Some(path_str))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"score\": 0.5"));
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["score"], 0.5);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let err = JsonReportAdapter
            .write(&json!({}), Some("/nonexistent/dir/report.json"))
            .unwrap_err();
        assert!(matches!(err, PlannerError::Io(_)));
    }
}

//! Concrete adapter implementations for ports.

pub mod constraint_enforcer;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_report_adapter;
pub mod json_snapshot_adapter;

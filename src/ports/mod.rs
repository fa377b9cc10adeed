//! Port traits the domain depends on.

pub mod config_port;
pub mod feasibility_port;
pub mod price_history_port;
pub mod report_port;
pub mod snapshot_port;

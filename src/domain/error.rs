//! Domain error types.

/// Top-level error type for seqplanner.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("failed to read snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },

    #[error("price history error for {symbol}: {reason}")]
    PriceHistory { symbol: String, reason: String },

    #[error("no valid sequence found")]
    NoValidSequence,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PlannerError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        PlannerError::InvalidInput {
            reason: reason.into(),
        }
    }
}

impl From<&PlannerError> for std::process::ExitCode {
    fn from(err: &PlannerError) -> Self {
        let code: u8 = match err {
            PlannerError::Io(_) => 1,
            PlannerError::ConfigParse { .. } | PlannerError::ConfigInvalid { .. } => 2,
            PlannerError::InvalidInput { .. }
            | PlannerError::Snapshot { .. }
            | PlannerError::Json(_) => 3,
            PlannerError::PriceHistory { .. } => 4,
            PlannerError::NoValidSequence => 5,
        };
        std::process::ExitCode::from(code)
    }
}

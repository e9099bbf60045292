//! Error types for engine operations.

use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine.
///
/// Per-tick processing never fails; only configuration loading and the
/// export precondition produce errors.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Nothing to export: no monitoring session was started")]
    NothingToExport,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl EngineError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// True for the user-facing "nothing to export" condition.
    pub fn is_nothing_to_export(&self) -> bool {
        matches!(self, Self::NothingToExport)
    }
}

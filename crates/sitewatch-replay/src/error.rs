//! Replay error types.

use std::path::PathBuf;

use thiserror::Error;

pub type ReplayResult<T> = Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("No frames found in {0}")]
    EmptySequence(PathBuf),

    #[error("No sequences found in {0}")]
    NoChannels(PathBuf),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Prediction load failed: {0}")]
    LoadFailed(String),

    #[error("Engine error: {0}")]
    Engine(#[from] sitewatch_engine::EngineError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplayError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn load_failed(msg: impl Into<String>) -> Self {
        Self::LoadFailed(msg.into())
    }
}

//! Handler-level errors.

use std::path::PathBuf;

use thiserror::Error;
use viewgrant_core::{ConfigError, ViewgrantError};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to read {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read event from stdin: {0}")]
    Stdin(#[source] std::io::Error),

    #[error("Invalid catalog seed file {path}: {reason}")]
    CatalogSeed { path: PathBuf, reason: String },

    #[error("Failed to initialize telemetry: {0}")]
    Telemetry(String),

    #[error("Failed to encode report: {0}")]
    Report(#[from] serde_json::Error),

    #[error(transparent)]
    Viewgrant(#[from] ViewgrantError),
}

impl From<ConfigError> for HandlerError {
    fn from(err: ConfigError) -> Self {
        Self::Viewgrant(err.into())
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

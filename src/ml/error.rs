use std::path::PathBuf;
use thiserror::Error;

/// Why a forecaster refused to fit a series
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("series too short: {len} observations, need at least {min}")]
    TooShort { len: usize, min: usize },

    #[error("series contains a non-finite value at index {index}")]
    NonFinite { index: usize },

    #[error("estimation did not converge: {0}")]
    NotConverged(String),
}

/// History lookup failures reported by a `HistoryProvider`
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no history available for {instrument}")]
    Unavailable { instrument: String },

    #[error("history backend error: {0}")]
    Backend(String),
}

/// Model store I/O failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("model store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model store path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid model key: {0:?}")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to fit {instrument}: {source}")]
    Fit {
        instrument: String,
        #[source]
        source: FitError,
    },

    #[error("model for {instrument} has not been fitted")]
    NotFitted { instrument: String },

    #[error("no model found for ticker {instrument}")]
    UnknownModel { instrument: String },

    #[error("forecast horizon must be >= 1, got {0}")]
    InvalidHorizon(i64),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored model belongs to {found}, expected {expected}")]
    InstrumentMismatch { expected: String, found: String },

    #[error("stored model type {found} does not match {expected}")]
    ModelTypeMismatch { expected: String, found: String },

    #[error("training failed for: {}", failed.join(", "))]
    TrainingFailed { failed: Vec<String> },
}

impl ModelError {
    /// Instrument named by the error, when there is one
    pub fn instrument(&self) -> Option<&str> {
        match self {
            ModelError::Fit { instrument, .. }
            | ModelError::NotFitted { instrument }
            | ModelError::UnknownModel { instrument } => Some(instrument),
            ModelError::History(HistoryError::Unavailable { instrument }) => Some(instrument),
            _ => None,
        }
    }
}

// src/errors.rs
use thiserror::Error;

/// Failure taxonomy for the reconciliation core.
///
/// Only `Configuration` aborts an operation. `Item` failures are recorded on
/// the affected record and the run continues; `Data` problems are normally
/// absorbed by falling back to an empty value and only surface through logs.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("item '{key}' failed: {reason}")]
    Item { key: String, reason: String },
    #[error("data error: {0}")]
    Data(String),
}

impl ReconcileError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        ReconcileError::Configuration(msg.into())
    }

    pub fn item(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ReconcileError::Item {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error should abort the whole operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconcileError::Configuration(_))
    }
}

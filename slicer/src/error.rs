//! Scheduling error types

use thiserror::Error;

/// Errors reported by the scheduling primitives
///
/// Caller callbacks that fail are isolated: the failure is reported as one of
/// these values and the run carries on with the remaining work.
#[derive(Debug, Error)]
pub enum SchedError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Processing item {index} failed: {message}")]
    Processing { index: usize, message: String },

    #[error("Delayed task {id} failed: {message}")]
    Action { id: String, message: String },
}

impl SchedError {
    /// Build a processing failure from a caller's error report
    pub(crate) fn processing(index: usize, report: &eyre::Report) -> Self {
        SchedError::Processing {
            index,
            message: format!("{:#}", report),
        }
    }

    /// Build an action failure for a registry id
    pub(crate) fn action(id: &impl std::fmt::Debug, report: &eyre::Report) -> Self {
        SchedError::Action {
            id: format!("{:?}", id),
            message: format!("{:#}", report),
        }
    }

    /// Check if this error came from a caller callback
    pub fn is_callback_failure(&self) -> bool {
        matches!(self, SchedError::Processing { .. } | SchedError::Action { .. })
    }

    /// Index of the failed item, for processing failures
    pub fn item_index(&self) -> Option<usize> {
        match self {
            SchedError::Processing { index, .. } => Some(*index),
            _ => None,
        }
    }
}

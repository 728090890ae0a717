//! Engine error taxonomy.
//!
//! Every fallible engine operation returns [`EngineError`]. The HTTP layer
//! only looks at [`EngineError::kind`] to pick a status code.

use crate::job::JobId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Out-of-range or malformed parameters.
    #[error("invalid `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },

    /// A continuous job already occupies the single continuous slot.
    #[error("continuous generation is already running (job {job_id})")]
    ContinuousAlreadyRunning { job_id: JobId },

    /// Stop was requested but the continuous slot is empty.
    #[error("no continuous generation is running")]
    NoContinuousJob,

    #[error("job {0} not found")]
    NotFound(JobId),
}

/// Coarse classification used by callers to map errors onto responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation { .. } => ErrorKind::Validation,
            EngineError::ContinuousAlreadyRunning { .. } | EngineError::NoContinuousJob => {
                ErrorKind::Conflict
            }
            EngineError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        EngineError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

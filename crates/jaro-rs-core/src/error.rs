//! Error types for the orchestration core.

use jaro_rs_protocol::{PlanValidationError, TransitionError};
use thiserror::Error;

/// Transport-neutral classification of a `CoreError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Unavailable,
    NoViablePlan,
    Canceled,
    Fatal,
}

/// Errors returned by engine operations and ports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Caller supplied an empty or malformed argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Record exists but is not in a state that permits the operation.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    /// A collaborator is temporarily unreachable.
    #[error("unavailable: {0}")]
    Unavailable(String),
    /// The planner could not produce a plan for the intent.
    #[error("no viable plan: {0}")]
    NoViablePlan(String),
    /// The request was canceled or its deadline passed.
    #[error("canceled: {0}")]
    Canceled(String),
    /// Unrecoverable failure.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            CoreError::Unavailable(_) => ErrorKind::Unavailable,
            CoreError::NoViablePlan(_) => ErrorKind::NoViablePlan,
            CoreError::Canceled(_) => ErrorKind::Canceled,
            CoreError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, CoreError::Canceled(_))
    }

    pub(crate) fn task_not_found(task_id: &str) -> Self {
        CoreError::NotFound(format!("task {task_id}"))
    }
}

impl From<TransitionError> for CoreError {
    fn from(err: TransitionError) -> Self {
        CoreError::FailedPrecondition(err.to_string())
    }
}

impl From<PlanValidationError> for CoreError {
    fn from(err: PlanValidationError) -> Self {
        CoreError::Fatal(format!("invalid plan: {err}"))
    }
}

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failure surfaced by the list-item controller and its stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    /// A local precondition failed; nothing was applied and no request was sent.
    #[error("{0}")]
    NotFound(String),
    /// Input rejected before any optimistic change.
    #[error("{0}")]
    Validation(String),
    #[error("{message}")]
    RemoteRejected { code: ErrorCode, message: String },
    #[error("network failure: {0}")]
    NetworkFailure(String),
}

impl ControllerError {
    /// Whether the store refused the request because the item is already in the list.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::RemoteRejected {
                code: ErrorCode::Conflict,
                ..
            }
        )
    }
}

impl From<ApiError> for ControllerError {
    fn from(value: ApiError) -> Self {
        Self::RemoteRejected {
            code: value.code,
            message: value.message,
        }
    }
}

impl From<reqwest::Error> for ControllerError {
    fn from(value: reqwest::Error) -> Self {
        Self::NetworkFailure(value.to_string())
    }
}

//! Error taxonomy for the dispatch core
//!
//! Every failure the core surfaces is exactly one of these kinds. The
//! messages are human-readable but not part of the contract; callers match
//! on the variant only.

use thiserror::Error;

/// Top-level core error
///
/// `Conflict` covers "already taken", "expired", "ride not dispatchable",
/// and illegal state-machine transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code for the wire surface.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "INVALID_ARGUMENT",
            CoreError::Unauthorized(_) => "UNAUTHORIZED",
            CoreError::Forbidden(_) => "FORBIDDEN",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Internal(_) => "INTERNAL",
        }
    }
}

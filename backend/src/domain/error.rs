//! Domain-level error types.
//!
//! These errors are transport agnostic. The HTTP layer maps any
//! [`ValidationError`] to a client error and every other
//! [`ConventionError`] variant to a server error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ports::{DocumentStoreError, SeedSourceError};

/// Stable machine-readable code describing why a request was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// A referenced convention, event, or ledger does not exist.
    NotFound,
    /// A convention with the requested id already exists.
    AlreadyExists,
    /// A required identifier is missing or empty.
    InvalidArgument,
    /// The request conflicts with the user's current registrations.
    FailedPrecondition,
}

/// Validation failure raised by the convention managers.
///
/// # Examples
/// ```
/// use convention_backend::domain::{ErrorCode, ValidationError};
///
/// let err = ValidationError::not_found("convention c1 does not exist");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert_eq!(err.to_string(), "convention c1 does not exist");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct ValidationError {
    code: ErrorCode,
    message: String,
}

impl ValidationError {
    /// Create a validation error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message returned to adapters.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::AlreadyExists`].
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyExists, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Convenience constructor for [`ErrorCode::FailedPrecondition`].
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedPrecondition, message)
    }
}

/// Failure returned by every [`ConventionManager`](super::ports::ConventionManager)
/// operation.
#[derive(Debug, Error)]
pub enum ConventionError {
    /// The request was rejected; safe to report back to the caller.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The backing document store failed.
    #[error("document store failure: {0}")]
    Store(#[from] DocumentStoreError),
    /// The bulk seed dataset could not be loaded.
    #[error("seed data failure: {0}")]
    Seed(#[from] SeedSourceError),
}

impl ConventionError {
    /// True for rejected requests, false for infrastructure failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Validation code, when this is a validation failure.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Validation(err) => Some(err.code()),
            Self::Store(_) | Self::Seed(_) => None,
        }
    }
}

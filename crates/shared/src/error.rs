//! Application-wide error types.
//!
//! Every failure that crosses the request/response boundary is one of these
//! kinds. Callers branch on [`AppError::status_code`] or
//! [`AppError::error_code`], never on the message text.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// No caller identity was supplied.
    #[error("{0}")]
    Unauthenticated(String),

    /// The caller is not an administrator.
    #[error("{0}")]
    PermissionDenied(String),

    /// Malformed, missing, or non-positive input.
    #[error("{0}")]
    InvalidArgument(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The entity is not in the state the operation requires.
    #[error("{0}")]
    FailedPrecondition(String),

    /// The route exists but not for this HTTP verb.
    #[error("{0}")]
    MethodNotAllowed(String),

    /// Storage failure or unexpected condition.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated(_) => 401,
            Self::PermissionDenied(_) => 403,
            Self::InvalidArgument(_) => 400,
            Self::NotFound(_) => 404,
            Self::FailedPrecondition(_) => 412,
            Self::MethodNotAllowed(_) => 405,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::PermissionDenied(_) => "permission-denied",
            Self::InvalidArgument(_) => "invalid-argument",
            Self::NotFound(_) => "not-found",
            Self::FailedPrecondition(_) => "failed-precondition",
            Self::MethodNotAllowed(_) => "method-not-allowed",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the human-readable message carried by the error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Unauthenticated(m)
            | Self::PermissionDenied(m)
            | Self::InvalidArgument(m)
            | Self::NotFound(m)
            | Self::FailedPrecondition(m)
            | Self::MethodNotAllowed(m)
            | Self::Internal(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::Unauthenticated(String::new()).status_code(), 401);
        assert_eq!(AppError::PermissionDenied(String::new()).status_code(), 403);
        assert_eq!(AppError::InvalidArgument(String::new()).status_code(), 400);
        assert_eq!(AppError::NotFound(String::new()).status_code(), 404);
        assert_eq!(AppError::FailedPrecondition(String::new()).status_code(), 412);
        assert_eq!(AppError::MethodNotAllowed(String::new()).status_code(), 405);
        assert_eq!(AppError::Internal(String::new()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::Unauthenticated(String::new()).error_code(),
            "unauthenticated"
        );
        assert_eq!(
            AppError::PermissionDenied(String::new()).error_code(),
            "permission-denied"
        );
        assert_eq!(
            AppError::InvalidArgument(String::new()).error_code(),
            "invalid-argument"
        );
        assert_eq!(AppError::NotFound(String::new()).error_code(), "not-found");
        assert_eq!(
            AppError::FailedPrecondition(String::new()).error_code(),
            "failed-precondition"
        );
        assert_eq!(
            AppError::MethodNotAllowed(String::new()).error_code(),
            "method-not-allowed"
        );
        assert_eq!(AppError::Internal(String::new()).error_code(), "internal");
    }

    #[test]
    fn test_error_display_is_message() {
        let err = AppError::FailedPrecondition("Withdrawal not found or already processed.".into());
        assert_eq!(err.to_string(), "Withdrawal not found or already processed.");
        assert_eq!(err.message(), "Withdrawal not found or already processed.");
    }
}

//! Engine Error Taxonomy
//!
//! Every operation exposed by the identity engine fails with an [`AppError`]
//! whose [`ErrorKind`] tells the caller what went wrong without leaking
//! internals:
//!
//! - Validation and policy failures carry a human-readable reason that is
//!   safe to return (it only restates what the caller supplied).
//! - Authentication failures are deliberately uniform so that "no such user"
//!   and "wrong password" cannot be told apart.
//! - Store and signing failures become [`ErrorKind::Internal`] with a fixed
//!   message; the underlying cause is kept in `details` for logging only.
//!
//! # Usage
//!
//! ```ignore
//! use postern::error::{AppError, Result};
//!
//! fn lookup(id: &str) -> Result<()> {
//!     if id.is_empty() {
//!         return Err(AppError::invalid_input("Identifier is required"));
//!     }
//!     Ok(())
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

// ============================================================================
// Error Types
// ============================================================================

/// Error returned by every engine operation.
#[derive(Debug)]
pub struct AppError {
    /// Error kind determines transport status and logging level
    pub kind: ErrorKind,
    /// Caller-facing message
    pub message: String,
    /// Internal details (logged, never rendered)
    pub details: Option<String>,
}

/// Error categories of the identity engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Name, email or password rules failed (400)
    InvalidInput,
    /// Name or email already registered (409)
    Conflict,
    /// Caller's claims do not permit the operation (403)
    Unauthorized,
    /// Identity resolution exhausted every criterion (404)
    NotFound,
    /// Login failed; identical for unknown identifier and wrong password (401)
    InvalidCredentials,
    /// Operation deliberately not offered (501)
    Unimplemented,
    /// Store or signing failure (500)
    Internal,
}

impl ErrorKind {
    /// HTTP status used when the error crosses the transport boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Unimplemented => StatusCode::NOT_IMPLEMENTED,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl AppError {
    /// Create a new error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Validation failure with its reason
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Duplicate name or email
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Authorization guard denied the caller
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Target account does not exist
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Uniform login failure
    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredentials, message)
    }

    /// Operation not offered
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unimplemented, message)
    }

    /// Internal failure; `source` is kept for logs only.
    pub fn internal(message: impl Into<String>, source: impl fmt::Display) -> Self {
        Self::new(ErrorKind::Internal, message).with_details(source.to_string())
    }

    /// Internal failure without an underlying cause
    pub fn internal_msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Attach internal details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    fn log(&self) {
        let details = self.details.as_deref().unwrap_or("none");

        match self.kind {
            ErrorKind::Internal => {
                tracing::error!(
                    error_kind = %self.kind,
                    message = %self.message,
                    details = %details,
                    "Internal error"
                );
            }
            ErrorKind::Unauthorized | ErrorKind::InvalidCredentials => {
                tracing::warn!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Auth error"
                );
            }
            _ => {
                tracing::debug!(
                    error_kind = %self.kind,
                    message = %self.message,
                    "Client error"
                );
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Conflict => write!(f, "conflict"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::NotFound => write!(f, "not_found"),
            Self::InvalidCredentials => write!(f, "invalid_credentials"),
            Self::Unimplemented => write!(f, "unimplemented"),
            Self::Internal => write!(f, "internal_error"),
        }
    }
}

impl std::error::Error for AppError {}

// ============================================================================
// Error Response
// ============================================================================

/// JSON error body
#[derive(Debug, Clone, serde::Serialize)]
pub struct ErrorResponse {
    /// Error kind
    pub error: String,
    /// Caller-facing message
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let body = ErrorResponse {
            error: self.kind.to_string(),
            message: self.message,
        };

        (self.kind.status_code(), Json(body)).into_response()
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<crate::policy::PolicyError> for AppError {
    fn from(err: crate::policy::PolicyError) -> Self {
        AppError::invalid_input(err.to_string())
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_status_codes() {
        assert_eq!(ErrorKind::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::Unauthorized.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorKind::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorKind::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ErrorKind::Unimplemented.status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
        assert_eq!(
            ErrorKind::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_keeps_source_in_details() {
        let err = AppError::internal("Could not find user", "connection reset");
        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.message, "Could not find user");
        assert_eq!(err.details.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_details_stay_out_of_display() {
        let err = AppError::internal_msg("Unable to login").with_details("account 42 missing");
        assert_eq!(err.details.as_deref(), Some("account 42 missing"));
        assert_eq!(err.to_string(), "internal_error: Unable to login");
    }

    #[test]
    fn test_policy_error_becomes_invalid_input() {
        let err: AppError = crate::policy::PolicyError::NameTooShort.into();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(err.message, crate::policy::PolicyError::NameTooShort.to_string());
    }

    #[test]
    fn test_error_display() {
        let err = AppError::not_found("Could not find user");
        assert_eq!(format!("{}", err), "not_found: Could not find user");
    }

    #[test]
    fn test_response_hides_details() {
        let response = AppError::internal("Unable to login", "rsa key rejected").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

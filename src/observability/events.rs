//! Security Event Logging
//!
//! Structured audit records for account and token activity. Every record
//! carries `security_event`, `category` and `severity` fields; the severity
//! picks the log level.
//!
//! # Usage
//!
//! ```ignore
//! use postern::observability::SecurityEvent;
//!
//! postern::security_event!(
//!     SecurityEvent::AuthenticationFailure,
//!     identifier = %identifier,
//!     "Authentication failed"
//! );
//! ```

use std::fmt;

/// Auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityEvent {
    // Authentication
    /// Credentials accepted
    AuthenticationSuccess,
    /// Credentials rejected
    AuthenticationFailure,
    /// Token signed for an account or service
    TokenIssued,
    /// Bearer token failed verification
    TokenRejected,

    // Authorization
    /// Guard allowed the caller
    AccessGranted,
    /// Guard denied the caller
    AccessDenied,

    // Account lifecycle
    /// New account stored
    UserRegistered,
    /// Registration input refused
    RegistrationRejected,
    /// Account removed
    UserDeleted,
    /// Balances increased
    CurrenciesGranted,
}

impl SecurityEvent {
    /// Event category for filtering
    pub fn category(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess
            | Self::AuthenticationFailure
            | Self::TokenIssued
            | Self::TokenRejected => "authentication",

            Self::AccessGranted | Self::AccessDenied => "authorization",

            Self::UserRegistered
            | Self::RegistrationRejected
            | Self::UserDeleted
            | Self::CurrenciesGranted => "user_management",
        }
    }

    /// Severity of the event
    pub fn severity(&self) -> Severity {
        match self {
            Self::AuthenticationFailure | Self::AccessDenied | Self::TokenRejected => {
                Severity::High
            }

            Self::AuthenticationSuccess
            | Self::UserRegistered
            | Self::UserDeleted
            | Self::CurrenciesGranted => Severity::Medium,

            Self::AccessGranted | Self::TokenIssued | Self::RegistrationRejected => Severity::Low,
        }
    }

    /// Snake-case event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess => "authentication_success",
            Self::AuthenticationFailure => "authentication_failure",
            Self::TokenIssued => "token_issued",
            Self::TokenRejected => "token_rejected",
            Self::AccessGranted => "access_granted",
            Self::AccessDenied => "access_denied",
            Self::UserRegistered => "user_registered",
            Self::RegistrationRejected => "registration_rejected",
            Self::UserDeleted => "user_deleted",
            Self::CurrenciesGranted => "currencies_granted",
        }
    }
}

impl fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Routine operations
    Low,
    /// Account state changes
    Medium,
    /// Rejected credentials or access
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Log a security event with structured fields.
///
/// Adds `security_event`, `category` and `severity` to the caller's fields.
/// High maps to `warn!`, Medium to `info!`, Low to `debug!`.
#[macro_export]
macro_rules! security_event {
    ($event:expr, $($field:tt)*) => {{
        let event = $event;
        let category = event.category();
        let event_name = event.name();

        match event.severity() {
            $crate::observability::Severity::High => {
                ::tracing::warn!(
                    security_event = event_name,
                    category = category,
                    severity = "high",
                    $($field)*
                );
            }
            $crate::observability::Severity::Medium => {
                ::tracing::info!(
                    security_event = event_name,
                    category = category,
                    severity = "medium",
                    $($field)*
                );
            }
            $crate::observability::Severity::Low => {
                ::tracing::debug!(
                    security_event = event_name,
                    category = category,
                    severity = "low",
                    $($field)*
                );
            }
        }
    }};
}

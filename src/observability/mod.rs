//! Observability
//!
//! Logging is plain `tracing`; this module installs the subscriber and
//! defines the audit event vocabulary used with [`security_event!`](crate::security_event).
//!
//! # Usage
//!
//! ```ignore
//! use postern::observability::{init, ObservabilityConfig};
//!
//! init(ObservabilityConfig::from_env())?;
//! ```

mod config;
mod events;
mod providers;

pub use config::{LogFormat, ObservabilityConfig, ObservabilityConfigBuilder};
pub use events::{SecurityEvent, Severity};

use tracing::info;

/// Install the global tracing subscriber.
///
/// Call once at startup, before any logging. Fails if the filter directive
/// is invalid or a global subscriber is already installed.
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    providers::init_tracing(&config)?;

    info!(log_format = ?config.log_format, "Observability initialized");

    Ok(())
}

/// Observability initialization errors
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// Invalid configuration
    #[error("Observability config error: {0}")]
    Config(String),
    /// Subscriber installation failed
    #[error("Provider error: {0}")]
    Provider(String),
}

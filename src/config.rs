//! Service configuration
//!
//! Token issuance settings and the location of the RSA keypair.

use std::path::PathBuf;
use std::time::Duration;

use crate::parse::parse_duration;
use crate::token::{KeyError, SigningKeys, TokenConfig, DEFAULT_ISSUER, DEFAULT_LIFETIME};

/// Configuration for the identity service.
///
/// # Example
///
/// ```ignore
/// use postern::config::ServiceConfig;
///
/// // Load from environment variables
/// let config = ServiceConfig::from_env();
///
/// // Or build programmatically
/// let config = ServiceConfig::builder()
///     .token_lifetime(Duration::from_secs(30 * 60))
///     .key_paths("keys/private.pem", "keys/public.pem")
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// `iss` claim written into and expected from tokens
    pub token_issuer: String,

    /// Validity window of issued tokens
    pub token_lifetime: Duration,

    /// PEM private key used for signing
    pub private_key_path: Option<PathBuf>,

    /// PEM public key used for verification
    pub public_key_path: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            token_issuer: DEFAULT_ISSUER.to_string(),
            token_lifetime: DEFAULT_LIFETIME,
            private_key_path: None,
            public_key_path: None,
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `TOKEN_ISSUER`: issuer name (default: "users-service")
    /// - `TOKEN_LIFETIME`: e.g., "8h", "30m", "45s" (default: "8h")
    /// - `RSA_PRIVATE_KEY_PATH`: PEM private key file
    /// - `RSA_PUBLIC_KEY_PATH`: PEM public key file
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let token_issuer = lookup("TOKEN_ISSUER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_ISSUER.to_string());

        let token_lifetime = lookup("TOKEN_LIFETIME")
            .and_then(|s| parse_duration(&s))
            .filter(|d| !d.is_zero())
            .unwrap_or(DEFAULT_LIFETIME);

        let private_key_path = lookup("RSA_PRIVATE_KEY_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let public_key_path = lookup("RSA_PUBLIC_KEY_PATH")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        Self {
            token_issuer,
            token_lifetime,
            private_key_path,
            public_key_path,
        }
    }

    /// Create a new builder for programmatic configuration.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Issuer settings for [`TokenIssuer`](crate::token::TokenIssuer)
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            issuer: self.token_issuer.clone(),
            lifetime: self.token_lifetime,
        }
    }

    /// Load the configured keypair.
    pub fn signing_keys(&self) -> Result<SigningKeys, KeyError> {
        let private = self
            .private_key_path
            .as_ref()
            .ok_or(KeyError::NotConfigured("RSA_PRIVATE_KEY_PATH"))?;
        let public = self
            .public_key_path
            .as_ref()
            .ok_or(KeyError::NotConfigured("RSA_PUBLIC_KEY_PATH"))?;

        SigningKeys::from_files(private, public)
    }
}

/// Builder for ServiceConfig
#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the token issuer name.
    pub fn token_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.token_issuer = issuer.into();
        self
    }

    /// Set the token lifetime.
    pub fn token_lifetime(mut self, lifetime: Duration) -> Self {
        self.config.token_lifetime = lifetime;
        self
    }

    /// Set both key file paths.
    pub fn key_paths(mut self, private: impl Into<PathBuf>, public: impl Into<PathBuf>) -> Self {
        self.config.private_key_path = Some(private.into());
        self.config.public_key_path = Some(public.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

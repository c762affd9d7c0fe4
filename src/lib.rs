//! # Postern
//!
//! Account registration, credential verification, RS512 session tokens and
//! claims-based authorization for a game backend.
//!
//! ## Components
//!
//! - **Credential Policy** ([`policy`]): name, email and password rules and
//!   the SHA-256 password digest
//! - **Identity Resolver** ([`resolver`]): one identifier tried as id, then
//!   name, then email
//! - **Authorization Guard** ([`guard`]): self-or-admin and global listing
//!   decisions over verified [`Claims`]
//! - **Token Issuer/Verifier** ([`token`]): RS512 tokens with a fixed
//!   lifetime, issuer and audience
//! - **Account Lifecycle** ([`engine`]): register, authenticate, read,
//!   delete, list, leaderboard and currency operations
//! - **Account Store** ([`store`]): in-memory store, and PostgreSQL with the
//!   `postgres` feature
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use postern::{EngineConfig, IdentityEngine, MemoryStore, ServiceConfig, TokenIssuer};
//! use postern::observability::{init, ObservabilityConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init(ObservabilityConfig::from_env())?;
//!
//!     let config = ServiceConfig::from_env();
//!     let tokens = TokenIssuer::new(config.signing_keys()?, config.token_config());
//!     let engine = IdentityEngine::new(EngineConfig {
//!         store: Arc::new(MemoryStore::new()),
//!         tokens,
//!     });
//!     Ok(())
//! }
//! ```

pub mod account;
pub mod claims;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod middleware;
pub mod observability;
mod parse;
pub mod policy;
pub mod resolver;
pub mod store;
pub mod token;

#[cfg(test)]
mod testing;

// Re-exports
pub use account::{Account, AccountProfile, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow};
pub use claims::Claims;
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use engine::{
    EngineConfig, IdentityEngine, IdentityService, LoginRequest, LoginResponse, RegisterRequest,
};
pub use error::{AppError, ErrorKind};
pub use middleware::{verify_bearer, Caller};
pub use parse::parse_duration;
pub use store::{AccountStore, MemoryStore, StoreError};
pub use token::{SigningKeys, TokenConfig, TokenIssuer, TokenVerifier};

#[cfg(feature = "postgres")]
pub use store::postgres::{PgAccountStore, PgStoreConfig, PgStoreConfigBuilder, SslMode};

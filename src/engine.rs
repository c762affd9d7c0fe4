//! Account Lifecycle Orchestrator
//!
//! [`IdentityEngine`] ties the credential policy, identity resolver,
//! authorization guard, token issuer and account store together. It keeps
//! no state between calls beyond the injected store handle and keypair, so
//! independent engines can run side by side.
//!
//! Callers pass verified [`Claims`] (or `None` for an unauthenticated
//! request). Every account value returned is an [`AccountProfile`], which has
//! no digest field.
//!
//! # Usage
//!
//! ```ignore
//! use postern::engine::{EngineConfig, IdentityEngine, IdentityService, RegisterRequest};
//!
//! let engine = IdentityEngine::new(EngineConfig { store, tokens });
//! let profile = engine.register(RegisterRequest {
//!     name: "Ann1".into(),
//!     email: "ann@example.com".into(),
//!     password: "Passw0rd".into(),
//! }).await?;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::{
    Account, AccountProfile, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow,
    LEADERBOARD_LIMIT,
};
use crate::claims::Claims;
use crate::error::{AppError, Result};
use crate::guard;
use crate::observability::SecurityEvent;
use crate::policy::{self, PasswordDigest};
use crate::resolver::{self, ResolveError};
use crate::store::{AccountFilter, AccountStore, StoreError, UniqueField};
use crate::token::TokenIssuer;

const NOT_AUTHORIZED: &str = "Not authorized for another user";
const INVALID_CREDENTIALS: &str = "Invalid login/password";
const CREATE_FAILED: &str = "Could not create new user";
const LOGIN_FAILED: &str = "Unable to login";
const NOT_FOUND: &str = "Could not find user";
const DELETE_FAILED: &str = "Could not delete user";
const GRANT_FAILED: &str = "Unable to grant currencies";
const LIST_RESTRICTED: &str = "Restricted access in global usage - please use order_by parameter";
const LIST_FAILED: &str = "Could not list users";
const STATS_FAILED: &str = "Could not fetch users by stats";

/// Future returned by [`IdentityService`] operations
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

// ============================================================================
// Requests and Responses
// ============================================================================

/// Registration input
#[derive(Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login input; `identifier` may be an id, a name or an email
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "login")]
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub is_admin: bool,
    pub user_id: String,
}

// ============================================================================
// Service Trait
// ============================================================================

/// Operations exposed to the transport layer
pub trait IdentityService: Send + Sync {
    /// Create an account after policy and uniqueness checks
    fn register(&self, request: RegisterRequest) -> ServiceFuture<'_, AccountProfile>;

    /// Check credentials and issue a session token
    fn authenticate(&self, request: LoginRequest) -> ServiceFuture<'_, LoginResponse>;

    /// Read the caller's own account (any account for admins)
    fn read<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, AccountProfile>;

    /// Not offered
    fn update<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, AccountProfile>;

    /// Delete by exact id; deleting an absent account succeeds
    fn delete<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, ()>;

    /// Every account; admins and internal services only
    fn list<'a>(&'a self, caller: Option<&'a Claims>) -> ServiceFuture<'a, Vec<AccountProfile>>;

    /// Stats rows ordered by an allow-listed field, at most [`LEADERBOARD_LIMIT`]
    fn leaderboard<'a>(&'a self, order_by: &'a str) -> ServiceFuture<'a, Vec<StatsRow>>;

    /// Add to an account's balances atomically
    fn grant_currencies<'a>(
        &'a self,
        identifier: &'a str,
        delta: CurrencyDelta,
    ) -> ServiceFuture<'a, Currencies>;

    /// Balances of the caller's own account (any account for admins)
    fn get_currencies<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, Currencies>;
}

// ============================================================================
// Engine
// ============================================================================

/// Collaborators injected into the engine
#[derive(Clone)]
pub struct EngineConfig {
    pub store: Arc<dyn AccountStore>,
    pub tokens: TokenIssuer,
}

/// The identity engine
#[derive(Clone)]
pub struct IdentityEngine {
    store: Arc<dyn AccountStore>,
    tokens: TokenIssuer,
}

fn store_failure(message: &'static str, identifier: &str, err: StoreError) -> AppError {
    tracing::error!(identifier = %identifier, error = %err, "{}", message);
    AppError::internal(message, err)
}

fn resolve_failure(identifier: &str, err: ResolveError) -> AppError {
    match err {
        ResolveError::NotFound => {
            tracing::debug!(identifier = %identifier, "Could not find user by any criteria");
            AppError::not_found(NOT_FOUND)
        }
        ResolveError::Store(e) => store_failure(NOT_FOUND, identifier, e),
    }
}

impl IdentityEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: config.store,
            tokens: config.tokens,
        }
    }

    /// Token issuer used for logins
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    async fn resolve(&self, identifier: &str) -> Result<Account> {
        resolver::resolve(self.store.as_ref(), identifier)
            .await
            .map_err(|e| resolve_failure(identifier, e))
    }

    async fn exists(&self, filter: AccountFilter, identifier: &str) -> Result<bool> {
        self.store
            .find_one(&filter)
            .await
            .map(|found| found.is_some())
            .map_err(|e| store_failure(CREATE_FAILED, identifier, e))
    }

    /// Register a new account.
    pub async fn register_account(&self, request: RegisterRequest) -> Result<AccountProfile> {
        let RegisterRequest {
            name,
            email,
            password,
        } = request;
        tracing::debug!(name = %name, email = %email, "Register user");

        let checks = policy::validate_name(&name)
            .and_then(|_| policy::validate_email(&email))
            .and_then(|_| policy::validate_password(&password));
        if let Err(reason) = checks {
            crate::security_event!(
                SecurityEvent::RegistrationRejected,
                name = %name,
                email = %email,
                reason = %reason,
                "Registration rejected"
            );
            return Err(reason.into());
        }

        if self.exists(AccountFilter::Name(name.clone()), &name).await? {
            tracing::info!(name = %name, "User with such name already exists");
            return Err(AppError::conflict("User with such name already exists"));
        }
        if self.exists(AccountFilter::Email(email.clone()), &email).await? {
            tracing::info!(email = %email, "User with such email already exists");
            return Err(AppError::conflict("User with such email already exists"));
        }

        let account = Account::new(name, email, PasswordDigest::compute(&password));
        let profile = account.profile();

        match self.store.create(account).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(UniqueField::Name)) => {
                return Err(AppError::conflict("User with such name already exists"));
            }
            Err(StoreError::Duplicate(UniqueField::Email)) => {
                return Err(AppError::conflict("User with such email already exists"));
            }
            Err(e) => return Err(store_failure(CREATE_FAILED, &profile.name, e)),
        }

        crate::security_event!(
            SecurityEvent::UserRegistered,
            user_id = %profile.id,
            name = %profile.name,
            email = %profile.email,
            "User registered"
        );

        Ok(profile)
    }

    /// Check credentials and issue a token.
    ///
    /// An unknown identifier, a store failure during resolution and a wrong
    /// password all produce the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse> {
        let LoginRequest {
            identifier,
            password,
        } = request;
        tracing::debug!(identifier = %identifier, "Login");

        let reject = |reason: &str| {
            crate::security_event!(
                SecurityEvent::AuthenticationFailure,
                identifier = %identifier,
                reason = %reason,
                "Authentication failed"
            );
            AppError::invalid_credentials(INVALID_CREDENTIALS)
        };

        let account = match resolver::resolve(self.store.as_ref(), &identifier).await {
            Ok(account) => account,
            Err(ResolveError::NotFound) => {
                let _ = PasswordDigest::placeholder().matches(&password);
                return Err(reject("unknown_identifier"));
            }
            Err(ResolveError::Store(e)) => {
                tracing::error!(identifier = %identifier, error = %e, "Login lookup failed");
                return Err(reject("lookup_failed"));
            }
        };

        if !account.password_digest.matches(&password) {
            return Err(reject("wrong_password"));
        }

        let by_id = AccountFilter::Id(account.id.clone());
        let is_admin = match self.store.find_one(&by_id).await {
            Ok(Some(fresh)) => fresh.is_admin,
            Ok(None) => {
                tracing::error!(user_id = %account.id, "Account vanished during login");
                return Err(AppError::internal_msg(LOGIN_FAILED)
                    .with_details(format!("account {} missing on re-read", account.id)));
            }
            Err(e) => return Err(store_failure(LOGIN_FAILED, &identifier, e)),
        };

        let issued = self.tokens.issue(&account, is_admin).map_err(|e| {
            tracing::error!(user_id = %account.id, error = %e, "Failed to sign claims");
            AppError::internal(LOGIN_FAILED, e)
        })?;

        crate::security_event!(
            SecurityEvent::AuthenticationSuccess,
            user_id = %account.id,
            identifier = %identifier,
            is_admin = is_admin,
            "User authenticated"
        );

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at,
            is_admin,
            user_id: account.id,
        })
    }

    /// Read an account the caller may access.
    pub async fn read_account(
        &self,
        identifier: &str,
        caller: Option<&Claims>,
    ) -> Result<AccountProfile> {
        tracing::debug!(identifier = %identifier, "Read user");
        require(caller, |c| guard::authorize_self(c, identifier), NOT_AUTHORIZED)?;

        self.resolve(identifier).await.map(Account::into_profile)
    }

    /// Delete by exact id.
    pub async fn delete_account(&self, identifier: &str, caller: Option<&Claims>) -> Result<()> {
        tracing::debug!(identifier = %identifier, "Delete user");
        let claims = require(
            caller,
            |c| guard::authorize_delete(c, identifier),
            NOT_AUTHORIZED,
        )?;

        let removed = self
            .store
            .delete(&AccountFilter::Id(identifier.to_string()))
            .await
            .map_err(|e| store_failure(DELETE_FAILED, identifier, e))?;

        if removed > 0 {
            crate::security_event!(
                SecurityEvent::UserDeleted,
                user_id = %identifier,
                deleted_by = %claims.sub,
                "User deleted"
            );
        }
        Ok(())
    }

    /// Every account, for admins and internal services.
    pub async fn list_accounts(&self, caller: Option<&Claims>) -> Result<Vec<AccountProfile>> {
        tracing::debug!("List users");
        require(caller, guard::authorize_global_list, LIST_RESTRICTED)?;

        let accounts = self
            .store
            .list()
            .await
            .map_err(|e| store_failure(LIST_FAILED, "*", e))?;
        Ok(accounts.into_iter().map(Account::into_profile).collect())
    }

    /// Stats rows ordered by `order_by`.
    pub async fn stats_leaderboard(&self, order_by: &str) -> Result<Vec<StatsRow>> {
        tracing::debug!(order_by = %order_by, "List users by stats");
        let order = LeaderboardOrder::parse(order_by)?;

        self.store
            .top_by_stats(order, LEADERBOARD_LIMIT)
            .await
            .map_err(|e| store_failure(STATS_FAILED, order_by, e))
    }

    /// Apply a currency grant.
    pub async fn grant(&self, identifier: &str, delta: CurrencyDelta) -> Result<Currencies> {
        tracing::debug!(identifier = %identifier, "Grant currencies");
        let account = self.resolve(identifier).await?;

        let balances = self
            .store
            .apply_currency_delta(&account.id, delta)
            .await
            .map_err(|e| store_failure(GRANT_FAILED, identifier, e))?;

        crate::security_event!(
            SecurityEvent::CurrenciesGranted,
            user_id = %account.id,
            add_coins = delta.add_coins,
            add_gems = delta.add_gems,
            "Currencies granted"
        );

        Ok(balances)
    }

    /// Balances of an account the caller may access.
    pub async fn currencies(
        &self,
        identifier: &str,
        caller: Option<&Claims>,
    ) -> Result<Currencies> {
        tracing::debug!(identifier = %identifier, "Get user currencies");
        require(caller, |c| guard::authorize_self(c, identifier), NOT_AUTHORIZED)?;

        self.resolve(identifier).await.map(|a| a.currencies())
    }
}

/// Deny when there are no claims or `check` refuses them
fn require<'c>(
    caller: Option<&'c Claims>,
    check: impl FnOnce(&Claims) -> bool,
    denial: &'static str,
) -> Result<&'c Claims> {
    match caller {
        Some(claims) if check(claims) => Ok(claims),
        Some(_) => Err(AppError::unauthorized(denial)),
        None => {
            crate::security_event!(
                SecurityEvent::AccessDenied,
                subject = "anonymous",
                reason = "missing_claims",
                "Access denied"
            );
            Err(AppError::unauthorized(denial))
        }
    }
}

impl IdentityService for IdentityEngine {
    fn register(&self, request: RegisterRequest) -> ServiceFuture<'_, AccountProfile> {
        Box::pin(self.register_account(request))
    }

    fn authenticate(&self, request: LoginRequest) -> ServiceFuture<'_, LoginResponse> {
        Box::pin(self.login(request))
    }

    fn read<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, AccountProfile> {
        Box::pin(self.read_account(identifier, caller))
    }

    fn update<'a>(
        &'a self,
        identifier: &'a str,
        _caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, AccountProfile> {
        Box::pin(async move {
            tracing::debug!(identifier = %identifier, "Update user");
            Err(AppError::unimplemented("Non-MVP endpoint"))
        })
    }

    fn delete<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(self.delete_account(identifier, caller))
    }

    fn list<'a>(&'a self, caller: Option<&'a Claims>) -> ServiceFuture<'a, Vec<AccountProfile>> {
        Box::pin(self.list_accounts(caller))
    }

    fn leaderboard<'a>(&'a self, order_by: &'a str) -> ServiceFuture<'a, Vec<StatsRow>> {
        Box::pin(self.stats_leaderboard(order_by))
    }

    fn grant_currencies<'a>(
        &'a self,
        identifier: &'a str,
        delta: CurrencyDelta,
    ) -> ServiceFuture<'a, Currencies> {
        Box::pin(self.grant(identifier, delta))
    }

    fn get_currencies<'a>(
        &'a self,
        identifier: &'a str,
        caller: Option<&'a Claims>,
    ) -> ServiceFuture<'a, Currencies> {
        Box::pin(self.currencies(identifier, caller))
    }
}

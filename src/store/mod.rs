//! Account Storage
//!
//! The engine talks to persistence only through [`AccountStore`]. The trait is
//! object-safe (boxed futures) so the engine can hold an
//! `Arc<dyn AccountStore>` chosen at startup.
//!
//! Implementations must enforce name and email uniqueness themselves and
//! apply currency deltas atomically; the engine's pre-checks are advisory.
//!
//! - [`memory::MemoryStore`]: in-process store, always available
//! - `postgres::PgAccountStore`: PostgreSQL via sqlx (feature `postgres`)

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::account::{Account, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;

/// Future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Exact-match lookup criterion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountFilter {
    Id(String),
    Name(String),
    Email(String),
}

impl AccountFilter {
    /// Whether `account` matches this filter
    pub fn matches(&self, account: &Account) -> bool {
        match self {
            Self::Id(id) => account.id == *id,
            Self::Name(name) => account.name == *name,
            Self::Email(email) => account.email == *email,
        }
    }
}

/// Field covered by a uniqueness constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    Name,
    Email,
}

impl fmt::Display for UniqueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Email => write!(f, "email"),
        }
    }
}

/// Store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Uniqueness constraint violated
    #[error("duplicate {0}")]
    Duplicate(UniqueField),
    /// Balance arithmetic or another integrity rule failed
    #[error("constraint violated: {0}")]
    Constraint(String),
    /// Backend unavailable or query failed
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence operations used by the engine
pub trait AccountStore: Send + Sync {
    /// First account matching `filter`, if any
    fn find_one<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, Option<Account>>;

    /// Insert a new account
    fn create(&self, account: Account) -> StoreFuture<'_, ()>;

    /// Add `delta` to the account's balances in one atomic step and return
    /// the new balances
    fn apply_currency_delta<'a>(
        &'a self,
        id: &'a str,
        delta: CurrencyDelta,
    ) -> StoreFuture<'a, Currencies>;

    /// Remove matching accounts, returning how many were removed
    fn delete<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, u64>;

    /// Every account
    fn list(&self) -> StoreFuture<'_, Vec<Account>>;

    /// Stats rows ordered by `order`, at most `limit` of them
    fn top_by_stats(&self, order: LeaderboardOrder, limit: usize) -> StoreFuture<'_, Vec<StatsRow>>;
}

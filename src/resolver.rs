//! Identity Resolver
//!
//! Maps a caller-supplied identifier to one account by trying it as an id,
//! then a name, then an email. The first exact match wins; there is no
//! ambiguity detection across criteria since name and email are unique.

use crate::account::Account;
use crate::store::{AccountFilter, AccountStore, StoreError};

/// One lookup criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    Id,
    Name,
    Email,
}

impl LookupStrategy {
    /// Order in which criteria are tried
    pub const ORDER: [LookupStrategy; 3] = [Self::Id, Self::Name, Self::Email];

    /// Exact-match filter for `identifier` under this criterion
    pub fn filter(&self, identifier: &str) -> AccountFilter {
        match self {
            Self::Id => AccountFilter::Id(identifier.to_string()),
            Self::Name => AccountFilter::Name(identifier.to_string()),
            Self::Email => AccountFilter::Email(identifier.to_string()),
        }
    }
}

/// Resolution failure
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No criterion matched
    #[error("no account matches the identifier")]
    NotFound,
    /// Store failed during a lookup
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve `identifier` against `store`.
///
/// Store errors are returned as soon as they occur; later criteria are not
/// tried.
pub async fn resolve(store: &dyn AccountStore, identifier: &str) -> Result<Account, ResolveError> {
    for strategy in LookupStrategy::ORDER {
        let filter = strategy.filter(identifier);
        if let Some(account) = store.find_one(&filter).await? {
            tracing::trace!(identifier = %identifier, strategy = ?strategy, "Identifier resolved");
            return Ok(account);
        }
    }
    Err(ResolveError::NotFound)
}

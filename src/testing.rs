//! Test fixtures: an RSA keypair, seeded stores and engines, callers, and
//! hostile input corpora.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::account::{Account, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow};
use crate::claims::{Claims, PUBLIC_AUDIENCE};
use crate::engine::{EngineConfig, IdentityEngine};
use crate::error::AppError;
use crate::policy::PasswordDigest;
use crate::store::{AccountFilter, AccountStore, MemoryStore, StoreError, StoreFuture};
use crate::token::{SigningKeys, TokenConfig, TokenIssuer, DEFAULT_ISSUER};

pub const PRIVATE_PEM: &str = include_str!("../testdata/signing_key.pem");
pub const PUBLIC_PEM: &str = include_str!("../testdata/signing_key.pub.pem");
/// Public half of an unrelated keypair
pub const FOREIGN_PUBLIC_PEM: &str = include_str!("../testdata/foreign_key.pub.pem");

/// Password used by every seeded account
pub const PASSWORD: &str = "Passw0rd";

pub fn signing_keys() -> SigningKeys {
    SigningKeys::from_pem(PRIVATE_PEM, PUBLIC_PEM).unwrap()
}

pub fn test_issuer() -> TokenIssuer {
    TokenIssuer::new(signing_keys(), TokenConfig::default())
}

/// Account with a fixed id and [`PASSWORD`]
pub fn account(id: &str, name: &str, email: &str) -> Account {
    let mut account = Account::new(name, email, PasswordDigest::compute(PASSWORD));
    account.id = id.to_string();
    account
}

/// Store holding `accounts`
pub async fn seeded_store(accounts: Vec<Account>) -> MemoryStore {
    let store = MemoryStore::new();
    for account in accounts {
        store.create(account).await.unwrap();
    }
    store
}

/// Engine over `store` with the test keypair
pub fn engine(store: MemoryStore) -> IdentityEngine {
    IdentityEngine::new(EngineConfig {
        store: Arc::new(store),
        tokens: test_issuer(),
    })
}

/// Verified end-user claims
pub fn caller(id: &str, name: &str, email: &str, is_admin: bool) -> Claims {
    Claims {
        sub: id.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        is_admin,
        aud: PUBLIC_AUDIENCE.to_string(),
        exp: i64::MAX,
        iat: 0,
        nbf: 0,
        jti: uuid::Uuid::new_v4().to_string(),
        iss: DEFAULT_ISSUER.to_string(),
    }
}

/// Store whose every operation fails with a backend error
#[derive(Debug, Default)]
pub struct FailingStore {
    lookups: AtomicUsize,
}

impl FailingStore {
    /// Number of `find_one` calls seen
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

fn unavailable() -> StoreError {
    StoreError::Backend("connection reset".to_string())
}

impl AccountStore for FailingStore {
    fn find_one<'a>(&'a self, _filter: &'a AccountFilter) -> StoreFuture<'a, Option<Account>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Err(unavailable()) })
    }

    fn create(&self, _account: Account) -> StoreFuture<'_, ()> {
        Box::pin(async { Err(unavailable()) })
    }

    fn apply_currency_delta<'a>(
        &'a self,
        _id: &'a str,
        _delta: CurrencyDelta,
    ) -> StoreFuture<'a, Currencies> {
        Box::pin(async { Err(unavailable()) })
    }

    fn delete<'a>(&'a self, _filter: &'a AccountFilter) -> StoreFuture<'a, u64> {
        Box::pin(async { Err(unavailable()) })
    }

    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(async { Err(unavailable()) })
    }

    fn top_by_stats(
        &self,
        _order: LeaderboardOrder,
        _limit: usize,
    ) -> StoreFuture<'_, Vec<StatsRow>> {
        Box::pin(async { Err(unavailable()) })
    }
}

/// Engine over a store that always fails
pub fn failing_engine() -> IdentityEngine {
    IdentityEngine::new(EngineConfig {
        store: Arc::new(FailingStore::default()),
        tokens: test_issuer(),
    })
}

/// Store whose lookups never see an account, as when a concurrent writer
/// commits between the uniqueness check and the insert. Writes go to the
/// wrapped [`MemoryStore`], which still enforces uniqueness.
#[derive(Debug)]
pub struct StaleReadStore {
    inner: MemoryStore,
    creates: AtomicUsize,
}

impl StaleReadStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            creates: AtomicUsize::new(0),
        }
    }

    /// Number of `create` calls that reached the store
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }
}

impl AccountStore for StaleReadStore {
    fn find_one<'a>(&'a self, _filter: &'a AccountFilter) -> StoreFuture<'a, Option<Account>> {
        Box::pin(async { Ok(None) })
    }

    fn create(&self, account: Account) -> StoreFuture<'_, ()> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(account)
    }

    fn apply_currency_delta<'a>(
        &'a self,
        id: &'a str,
        delta: CurrencyDelta,
    ) -> StoreFuture<'a, Currencies> {
        self.inner.apply_currency_delta(id, delta)
    }

    fn delete<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, u64> {
        self.inner.delete(filter)
    }

    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        self.inner.list()
    }

    fn top_by_stats(
        &self,
        order: LeaderboardOrder,
        limit: usize,
    ) -> StoreFuture<'_, Vec<StatsRow>> {
        self.inner.top_by_stats(order, limit)
    }
}

/// Two failures are indistinguishable to a client
pub fn assert_same_failure(a: &AppError, b: &AppError) {
    assert_eq!(a.kind, b.kind, "error kinds differ");
    assert_eq!(a.message, b.message, "error messages differ");
}

/// Common SQL injection strings
pub fn sql_injection_payloads() -> Vec<&'static str> {
    vec![
        "' OR '1'='1",
        "' OR 1=1--",
        "1 OR 1=1",
        "' UNION SELECT username,password FROM users--",
        "'; DROP TABLE users;--",
        "admin'--",
        "wins; DELETE FROM users",
        "wins desc; DROP TABLE user_stats",
        "(SELECT password_hash FROM users LIMIT 1)",
    ]
}

/// Common weak passwords
pub fn weak_passwords() -> Vec<&'static str> {
    vec![
        "password",
        "123456",
        "12345678",
        "qwerty",
        "abc123",
        "password1",
        "letmein",
        "passw0rd",
        "trustno1",
        "Short1",
        "P@ssw0rd",
    ]
}

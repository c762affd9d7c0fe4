//! PostgreSQL account store.
//!
//! Accounts live in `users`, statistics in `user_stats` (one row per user).
//! Name and email uniqueness are `UNIQUE` constraints; a violation is
//! reported as [`StoreError::Duplicate`]. Currency grants are a single
//! `UPDATE ... SET coins = coins + $1` so concurrent grants never lose an
//! increment.
//!
//! The schema is in `migrations/`; call [`PgAccountStore::migrate`] at
//! startup to apply it.

use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow, PgSslMode};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use super::{AccountFilter, AccountStore, StoreError, StoreFuture, UniqueField};
use crate::account::{
    Account, AccountStats, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow,
};
use crate::parse::parse_duration;
use crate::policy::PasswordDigest;

const UNIQUE_VIOLATION: &str = "23505";
const NAME_CONSTRAINT: &str = "users_name_key";
const EMAIL_CONSTRAINT: &str = "users_email_key";

const SELECT_ACCOUNT: &str = "SELECT u.id, u.name, u.email, u.password_hash, u.coins, u.gems, u.is_admin, \
     COALESCE(s.games, 0) AS games, COALESCE(s.wins, 0) AS wins, \
     COALESCE(s.top5, 0) AS top5, COALESCE(s.kills, 0) AS kills \
     FROM users u LEFT JOIN user_stats s ON s.user_id = u.id";

// ============================================================================
// Configuration
// ============================================================================

/// SSL/TLS mode for database connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Never use SSL (development only)
    Disable,
    /// Use SSL if available
    Prefer,
    /// Require SSL
    #[default]
    Require,
    /// Require SSL and verify the server certificate
    VerifyCa,
    /// Require SSL, verify certificate and hostname
    VerifyFull,
}

impl SslMode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Some(Self::Disable),
            "prefer" => Some(Self::Prefer),
            "require" => Some(Self::Require),
            "verify-ca" | "verifyca" => Some(Self::VerifyCa),
            "verify-full" | "verifyfull" => Some(Self::VerifyFull),
            _ => None,
        }
    }
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
            SslMode::VerifyCa => PgSslMode::VerifyCa,
            SslMode::VerifyFull => PgSslMode::VerifyFull,
        }
    }
}

/// Connection pool settings
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum pool size (default: 10)
    pub max_connections: u32,
    /// Maximum wait for a pooled connection (default: 30s)
    pub acquire_timeout: Duration,
    /// SSL mode (default: Require)
    pub ssl_mode: SslMode,
}

impl PgStoreConfig {
    /// Load from environment variables.
    ///
    /// - `DATABASE_URL`: connection URL (required)
    /// - `DB_MAX_CONNECTIONS`: pool size (default: 10)
    /// - `DB_ACQUIRE_TIMEOUT`: e.g. "30s" (default: 30s)
    /// - `DB_SSL_MODE`: disable|prefer|require|verify-ca|verify-full (default: require)
    pub fn from_env() -> Result<Self, StoreError> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| StoreError::Backend("DATABASE_URL is not set".to_string()))?;

        let mut builder = Self::builder(database_url);

        if let Some(n) = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            builder = builder.max_connections(n);
        }

        if let Some(timeout) = std::env::var("DB_ACQUIRE_TIMEOUT")
            .ok()
            .and_then(|s| parse_duration(&s))
        {
            builder = builder.acquire_timeout(timeout);
        }

        if let Ok(raw) = std::env::var("DB_SSL_MODE") {
            match SslMode::parse(&raw) {
                Some(mode) => builder = builder.ssl_mode(mode),
                None => warn!(value = %raw, "Unknown DB_SSL_MODE, using require"),
            }
        }

        Ok(builder.build())
    }

    /// Start a builder with the required URL
    pub fn builder(database_url: impl Into<String>) -> PgStoreConfigBuilder {
        PgStoreConfigBuilder {
            config: PgStoreConfig {
                database_url: database_url.into(),
                max_connections: 10,
                acquire_timeout: Duration::from_secs(30),
                ssl_mode: SslMode::default(),
            },
        }
    }
}

/// Builder for [`PgStoreConfig`]
#[derive(Debug, Clone)]
pub struct PgStoreConfigBuilder {
    config: PgStoreConfig,
}

impl PgStoreConfigBuilder {
    pub fn max_connections(mut self, n: u32) -> Self {
        self.config.max_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    pub fn ssl_mode(mut self, mode: SslMode) -> Self {
        self.config.ssl_mode = mode;
        self
    }

    pub fn build(self) -> PgStoreConfig {
        self.config
    }
}

// ============================================================================
// Store
// ============================================================================

/// Account store backed by PostgreSQL
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Unique field guarded by a constraint of the `users` table
fn unique_field(constraint: Option<&str>) -> Option<UniqueField> {
    match constraint? {
        NAME_CONSTRAINT => Some(UniqueField::Name),
        EMAIL_CONSTRAINT => Some(UniqueField::Email),
        _ => None,
    }
}

fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            if let Some(field) = unique_field(db.constraint()) {
                return StoreError::Duplicate(field);
            }
        }
    }
    backend(e)
}

fn to_u64(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Constraint(format!("negative {column}")))
}

fn to_i64(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Constraint(format!("{column} out of range")))
}

fn stats_from_row(row: &PgRow) -> Result<AccountStats, StoreError> {
    Ok(AccountStats {
        games: to_u64(row.try_get("games").map_err(backend)?, "games")?,
        wins: to_u64(row.try_get("wins").map_err(backend)?, "wins")?,
        top5: to_u64(row.try_get("top5").map_err(backend)?, "top5")?,
        kills: to_u64(row.try_get("kills").map_err(backend)?, "kills")?,
    })
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let digest: String = row.try_get("password_hash").map_err(backend)?;
    Ok(Account {
        id: row.try_get("id").map_err(backend)?,
        name: row.try_get("name").map_err(backend)?,
        email: row.try_get("email").map_err(backend)?,
        password_digest: PasswordDigest::from_stored(digest),
        coins: to_u64(row.try_get("coins").map_err(backend)?, "coins")?,
        gems: to_u64(row.try_get("gems").map_err(backend)?, "gems")?,
        is_admin: row.try_get("is_admin").map_err(backend)?,
        stats: stats_from_row(row)?,
    })
}

impl PgAccountStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from `config` and check it with a round trip
    pub async fn connect(config: &PgStoreConfig) -> Result<Self, StoreError> {
        info!(
            max_connections = config.max_connections,
            ssl_mode = ?config.ssl_mode,
            "Initializing account store pool"
        );

        let options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| StoreError::Backend(format!("Invalid DATABASE_URL: {}", e)))?
            .ssl_mode(config.ssl_mode.into());

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .test_before_acquire(true)
            .connect_with(options)
            .await
            .map_err(backend)?;

        let store = Self::new(pool);
        store.health_check().await?;
        Ok(store)
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// `SELECT 1` round trip
    pub async fn health_check(&self) -> Result<(), StoreError> {
        let start = std::time::Instant::now();
        let (one,): (i32,) = sqlx::query_as("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        if one != 1 {
            return Err(StoreError::Backend("Unexpected health check result".to_string()));
        }

        info!(latency_ms = start.elapsed().as_millis() as u64, "Account store health check passed");
        Ok(())
    }

    async fn fetch_one(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        let (column, value) = match filter {
            AccountFilter::Id(v) => ("u.id", v),
            AccountFilter::Name(v) => ("u.name", v),
            AccountFilter::Email(v) => ("u.email", v),
        };
        let sql = format!("{SELECT_ACCOUNT} WHERE {column} = $1 LIMIT 1");

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.as_ref().map(account_from_row).transpose()
    }

    async fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, coins, gems, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(&account.email)
        .bind(account.password_digest.as_str())
        .bind(to_i64(account.coins, "coins")?)
        .bind(to_i64(account.gems, "gems")?)
        .bind(account.is_admin)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            "INSERT INTO user_stats (user_id, games, wins, top5, kills) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&account.id)
        .bind(to_i64(account.stats.games, "games")?)
        .bind(to_i64(account.stats.wins, "wins")?)
        .bind(to_i64(account.stats.top5, "top5")?)
        .bind(to_i64(account.stats.kills, "kills")?)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)
    }

    async fn add_currencies(
        &self,
        id: &str,
        delta: CurrencyDelta,
    ) -> Result<Currencies, StoreError> {
        let row = sqlx::query(
            "UPDATE users SET coins = coins + $1, gems = gems + $2 WHERE id = $3 RETURNING coins, gems",
        )
        .bind(to_i64(delta.add_coins, "coins")?)
        .bind(to_i64(delta.add_gems, "gems")?)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::Constraint(format!("no account with id {id}")))?;

        Ok(Currencies {
            coins: to_u64(row.try_get("coins").map_err(backend)?, "coins")?,
            gems: to_u64(row.try_get("gems").map_err(backend)?, "gems")?,
        })
    }

    async fn remove(&self, filter: &AccountFilter) -> Result<u64, StoreError> {
        let (column, value) = match filter {
            AccountFilter::Id(v) => ("id", v),
            AccountFilter::Name(v) => ("name", v),
            AccountFilter::Email(v) => ("email", v),
        };
        let sql = format!("DELETE FROM users WHERE {column} = $1");

        let result = sqlx::query(&sql)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(result.rows_affected())
    }

    async fn all(&self) -> Result<Vec<Account>, StoreError> {
        let sql = format!("{SELECT_ACCOUNT} ORDER BY u.name");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(account_from_row).collect()
    }

    async fn top(
        &self,
        order: LeaderboardOrder,
        limit: usize,
    ) -> Result<Vec<StatsRow>, StoreError> {
        let sql = format!(
            "SELECT u.name, s.games, s.wins, s.top5, s.kills \
             FROM user_stats s JOIN users u ON u.id = s.user_id \
             ORDER BY s.{} {}, u.name LIMIT $1",
            order.field.column(),
            order.direction()
        );

        let rows = sqlx::query(&sql)
            .bind(to_i64(limit as u64, "limit")?)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.iter()
            .map(|row| {
                Ok(StatsRow {
                    name: row.try_get("name").map_err(backend)?,
                    stats: stats_from_row(row)?,
                })
            })
            .collect()
    }
}

impl AccountStore for PgAccountStore {
    fn find_one<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, Option<Account>> {
        Box::pin(self.fetch_one(filter))
    }

    fn create(&self, account: Account) -> StoreFuture<'_, ()> {
        Box::pin(self.insert(account))
    }

    fn apply_currency_delta<'a>(
        &'a self,
        id: &'a str,
        delta: CurrencyDelta,
    ) -> StoreFuture<'a, Currencies> {
        Box::pin(self.add_currencies(id, delta))
    }

    fn delete<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, u64> {
        Box::pin(self.remove(filter))
    }

    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(self.all())
    }

    fn top_by_stats(
        &self,
        order: LeaderboardOrder,
        limit: usize,
    ) -> StoreFuture<'_, Vec<StatsRow>> {
        Box::pin(self.top(order, limit))
    }
}

//! Account records and the values derived from them.
//!
//! [`Account`] is the stored record and carries the password digest. Anything
//! leaving the engine is an [`AccountProfile`], [`Currencies`] or a
//! [`StatsRow`], none of which has a digest field.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::policy::PasswordDigest;

/// Maximum rows returned by the leaderboard
pub const LEADERBOARD_LIMIT: usize = 100;

/// Per-account game statistics, zeroed at registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStats {
    pub games: u64,
    pub wins: u64,
    pub top5: u64,
    pub kills: u64,
}

/// Stored account record
#[derive(Debug, Clone)]
pub struct Account {
    /// Opaque id, a UUID v4 string assigned at registration
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_digest: PasswordDigest,
    pub coins: u64,
    pub gems: u64,
    /// Set out-of-band, never by registration
    pub is_admin: bool,
    pub stats: AccountStats,
}

impl Account {
    /// New non-admin account with a fresh id, zero balances and zero stats
    pub fn new(name: impl Into<String>, email: impl Into<String>, digest: PasswordDigest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            email: email.into(),
            password_digest: digest,
            coins: 0,
            gems: 0,
            is_admin: false,
            stats: AccountStats::default(),
        }
    }

    /// Sanitized copy
    pub fn profile(&self) -> AccountProfile {
        AccountProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            coins: self.coins,
            gems: self.gems,
            is_admin: self.is_admin,
            stats: self.stats,
        }
    }

    /// Sanitized view, consuming the record
    pub fn into_profile(self) -> AccountProfile {
        AccountProfile {
            id: self.id,
            name: self.name,
            email: self.email,
            coins: self.coins,
            gems: self.gems,
            is_admin: self.is_admin,
            stats: self.stats,
        }
    }

    /// Current balances
    pub fn currencies(&self) -> Currencies {
        Currencies {
            coins: self.coins,
            gems: self.gems,
        }
    }
}

/// Account as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub coins: u64,
    pub gems: u64,
    pub is_admin: bool,
    pub stats: AccountStats,
}

/// Currency balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currencies {
    pub coins: u64,
    pub gems: u64,
}

/// Amounts to add to an account's balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDelta {
    pub add_coins: u64,
    pub add_gems: u64,
}

/// Leaderboard row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRow {
    pub name: String,
    pub stats: AccountStats,
}

// ============================================================================
// Leaderboard Ordering
// ============================================================================

/// Statistic a leaderboard can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsField {
    Games,
    Wins,
    Top5,
    Kills,
}

impl StatsField {
    /// Column name in the stats table
    pub fn column(&self) -> &'static str {
        match self {
            Self::Games => "games",
            Self::Wins => "wins",
            Self::Top5 => "top5",
            Self::Kills => "kills",
        }
    }

    /// Read this field from a stats record
    pub fn value(&self, stats: &AccountStats) -> u64 {
        match self {
            Self::Games => stats.games,
            Self::Wins => stats.wins,
            Self::Top5 => stats.top5,
            Self::Kills => stats.kills,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "games" => Some(Self::Games),
            "wins" => Some(Self::Wins),
            "top5" => Some(Self::Top5),
            "kills" => Some(Self::Kills),
            _ => None,
        }
    }
}

/// Parsed `order_by` expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaderboardOrder {
    pub field: StatsField,
    pub descending: bool,
}

impl LeaderboardOrder {
    /// Parse `"<field> [asc|desc]"`.
    ///
    /// Only the first comma-separated term is used. Matching is
    /// case-insensitive and the direction defaults to ascending.
    pub fn parse(order_by: &str) -> Result<Self, AppError> {
        let unsupported = || AppError::invalid_input("Unsupported order_by field");

        let term = order_by.split(',').next().unwrap_or_default();
        let mut parts = term.split_whitespace();

        let field = parts
            .next()
            .and_then(StatsField::parse)
            .ok_or_else(unsupported)?;

        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(_) => return Err(unsupported()),
        };

        if parts.next().is_some() {
            return Err(unsupported());
        }

        Ok(Self { field, descending })
    }

    /// SQL direction keyword
    pub fn direction(&self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }
}

//! In-process account store.
//!
//! Accounts live in a map keyed by id behind one `RwLock`. Uniqueness checks
//! and inserts happen under the same write guard, as do currency deltas, so
//! each operation is atomic with respect to the others.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{AccountFilter, AccountStore, StoreError, StoreFuture, UniqueField};
use crate::account::{Account, AccountStats, Currencies, CurrencyDelta, LeaderboardOrder, StatsRow};

/// Account store held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
}

fn poisoned() -> StoreError {
    StoreError::Backend("account map lock poisoned".to_string())
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts
    pub fn len(&self) -> usize {
        self.accounts.read().map(|a| a.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grant or revoke the admin flag
    pub fn set_admin(&self, id: &str, is_admin: bool) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::Constraint(format!("no account with id {id}")))?;
        account.is_admin = is_admin;
        Ok(())
    }

    /// Replace an account's game statistics
    pub fn set_stats(&self, id: &str, stats: AccountStats) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::Constraint(format!("no account with id {id}")))?;
        account.stats = stats;
        Ok(())
    }

    fn find(&self, filter: &AccountFilter) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.values().find(|a| filter.matches(a)).cloned())
    }

    fn remove(&self, filter: &AccountFilter) -> Result<u64, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let before = accounts.len();
        accounts.retain(|_, a| !filter.matches(a));
        Ok((before - accounts.len()) as u64)
    }

    fn snapshot(&self) -> Result<Vec<Account>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    fn insert(&self, account: Account) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;

        if accounts.contains_key(&account.id) {
            return Err(StoreError::Constraint(format!("id {} already used", account.id)));
        }
        if accounts.values().any(|a| a.name == account.name) {
            return Err(StoreError::Duplicate(UniqueField::Name));
        }
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Duplicate(UniqueField::Email));
        }

        accounts.insert(account.id.clone(), account);
        Ok(())
    }

    fn apply_delta(&self, id: &str, delta: CurrencyDelta) -> Result<Currencies, StoreError> {
        let mut accounts = self.accounts.write().map_err(|_| poisoned())?;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| StoreError::Constraint(format!("no account with id {id}")))?;

        let coins = account
            .coins
            .checked_add(delta.add_coins)
            .ok_or_else(|| StoreError::Constraint("coin balance overflow".to_string()))?;
        let gems = account
            .gems
            .checked_add(delta.add_gems)
            .ok_or_else(|| StoreError::Constraint("gem balance overflow".to_string()))?;

        account.coins = coins;
        account.gems = gems;
        Ok(account.currencies())
    }

    fn top(&self, order: LeaderboardOrder, limit: usize) -> Result<Vec<StatsRow>, StoreError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        let mut rows: Vec<StatsRow> = accounts
            .values()
            .map(|a| StatsRow {
                name: a.name.clone(),
                stats: a.stats,
            })
            .collect();

        rows.sort_by(|a, b| {
            let ordering = order.field.value(&a.stats).cmp(&order.field.value(&b.stats));
            let ordering = if order.descending { ordering.reverse() } else { ordering };
            ordering.then_with(|| a.name.cmp(&b.name))
        });
        rows.truncate(limit);
        Ok(rows)
    }
}

impl AccountStore for MemoryStore {
    fn find_one<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, Option<Account>> {
        Box::pin(async move { self.find(filter) })
    }

    fn create(&self, account: Account) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.insert(account) })
    }

    fn apply_currency_delta<'a>(
        &'a self,
        id: &'a str,
        delta: CurrencyDelta,
    ) -> StoreFuture<'a, Currencies> {
        Box::pin(async move { self.apply_delta(id, delta) })
    }

    fn delete<'a>(&'a self, filter: &'a AccountFilter) -> StoreFuture<'a, u64> {
        Box::pin(async move { self.remove(filter) })
    }

    fn list(&self) -> StoreFuture<'_, Vec<Account>> {
        Box::pin(async move { self.snapshot() })
    }

    fn top_by_stats(
        &self,
        order: LeaderboardOrder,
        limit: usize,
    ) -> StoreFuture<'_, Vec<StatsRow>> {
        Box::pin(async move { self.top(order, limit) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::StatsField;
    use crate::policy::PasswordDigest;

    fn account(name: &str, email: &str) -> Account {
        Account::new(name, email, PasswordDigest::compute("Passw0rd"))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = MemoryStore::new();
        let bob = account("bobby", "b@x.com");
        let id = bob.id.clone();
        store.create(bob).await.unwrap();

        let found = store
            .find_one(&AccountFilter::Email("b@x.com".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, id);
        assert!(store
            .find_one(&AccountFilter::Name("alice".into()))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_uniqueness_enforced() {
        let store = MemoryStore::new();
        store.create(account("bobby", "b@x.com")).await.unwrap();

        let err = store.create(account("bobby", "other@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Name)));

        let err = store.create(account("alice", "b@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(UniqueField::Email)));

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delta_and_overflow() {
        let store = MemoryStore::new();
        let bob = account("bobby", "b@x.com");
        let id = bob.id.clone();
        store.create(bob).await.unwrap();

        let balances = store
            .apply_currency_delta(
                &id,
                CurrencyDelta {
                    add_coins: 7,
                    add_gems: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(balances, Currencies { coins: 7, gems: 2 });

        let err = store
            .apply_currency_delta(
                &id,
                CurrencyDelta {
                    add_coins: u64::MAX,
                    add_gems: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));

        let unchanged = store
            .find_one(&AccountFilter::Id(id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(unchanged.currencies(), Currencies { coins: 7, gems: 2 });
    }

    #[tokio::test]
    async fn test_delete_counts_rows() {
        let store = MemoryStore::new();
        let bob = account("bobby", "b@x.com");
        let filter = AccountFilter::Id(bob.id.clone());
        store.create(bob).await.unwrap();

        assert_eq!(store.delete(&filter).await.unwrap(), 1);
        assert_eq!(store.delete(&filter).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_top_by_stats_orders_and_limits() {
        let store = MemoryStore::new();
        for (name, wins) in [("alice", 3), ("bobby", 9), ("carol", 5)] {
            let a = account(name, &format!("{name}@x.com"));
            let id = a.id.clone();
            store.create(a).await.unwrap();
            let stats = AccountStats {
                wins,
                ..Default::default()
            };
            store.set_stats(&id, stats).unwrap();
        }

        let order = LeaderboardOrder {
            field: StatsField::Wins,
            descending: true,
        };
        let rows = store.top_by_stats(order, 2).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["bobby", "carol"]);

        let order = LeaderboardOrder {
            field: StatsField::Wins,
            descending: false,
        };
        let rows = store.top_by_stats(order, 10).await.unwrap();
        assert_eq!(rows[0].name, "alice");
        assert_eq!(rows.len(), 3);
    }
}

use chrono::{DateTime, Utc};

use crate::models::Paste;

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sql;

pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sql::SqlStore;

/// Keyed paste storage.
///
/// Stores never look at expiry on single-record reads; deciding what is live is up to the
/// caller.
pub trait PasteStore {
    /// Insert a new paste, failing with `DuplicateId` if its id was ever issued before.
    async fn insert(&self, paste: &Paste) -> crate::ApiResult<()>;

    /// Get a paste by id, expired or not.
    async fn get(&self, id: &str) -> crate::ApiResult<Paste>;

    /// Atomically add one view and return the new count.
    async fn increment_views(&self, id: &str) -> crate::ApiResult<i64>;

    /// Remove a paste. Returns whether anything was removed.
    async fn delete(&self, id: &str) -> crate::ApiResult<bool>;

    /// Remove every paste with `expires_at <= now`, returning how many were removed.
    async fn delete_expired_before(&self, now: DateTime<Utc>) -> crate::ApiResult<u64>;

    /// Newest pastes still live at `now`.
    async fn list_recent(&self, limit: usize, now: DateTime<Utc>) -> crate::ApiResult<Vec<Paste>>;

    async fn count_live(&self, now: DateTime<Utc>) -> crate::ApiResult<u64>;

    async fn load_visit_count(&self) -> crate::ApiResult<u64>;

    async fn save_visit_count(&self, count: u64) -> crate::ApiResult<()>;
}

#[derive(Clone)]
pub enum AnyStore {
    Memory(MemoryStore),
    #[cfg(feature = "sqlite")]
    Sql(SqlStore),
}

impl PasteStore for AnyStore {
    async fn insert(&self, paste: &Paste) -> crate::ApiResult<()> {
        match self {
            AnyStore::Memory(store) => store.insert(paste).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.insert(paste).await,
        }
    }

    async fn get(&self, id: &str) -> crate::ApiResult<Paste> {
        match self {
            AnyStore::Memory(store) => store.get(id).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.get(id).await,
        }
    }

    async fn increment_views(&self, id: &str) -> crate::ApiResult<i64> {
        match self {
            AnyStore::Memory(store) => store.increment_views(id).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.increment_views(id).await,
        }
    }

    async fn delete(&self, id: &str) -> crate::ApiResult<bool> {
        match self {
            AnyStore::Memory(store) => store.delete(id).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.delete(id).await,
        }
    }

    async fn delete_expired_before(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        match self {
            AnyStore::Memory(store) => store.delete_expired_before(now).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.delete_expired_before(now).await,
        }
    }

    async fn list_recent(&self, limit: usize, now: DateTime<Utc>) -> crate::ApiResult<Vec<Paste>> {
        match self {
            AnyStore::Memory(store) => store.list_recent(limit, now).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.list_recent(limit, now).await,
        }
    }

    async fn count_live(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        match self {
            AnyStore::Memory(store) => store.count_live(now).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.count_live(now).await,
        }
    }

    async fn load_visit_count(&self) -> crate::ApiResult<u64> {
        match self {
            AnyStore::Memory(store) => store.load_visit_count().await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.load_visit_count().await,
        }
    }

    async fn save_visit_count(&self, count: u64) -> crate::ApiResult<()> {
        match self {
            AnyStore::Memory(store) => store.save_visit_count(count).await,
            #[cfg(feature = "sqlite")]
            AnyStore::Sql(store) => store.save_visit_count(count).await,
        }
    }
}

impl From<MemoryStore> for AnyStore {
    fn from(value: MemoryStore) -> Self {
        AnyStore::Memory(value)
    }
}

#[cfg(feature = "sqlite")]
impl From<SqlStore> for AnyStore {
    fn from(value: SqlStore) -> Self {
        AnyStore::Sql(value)
    }
}

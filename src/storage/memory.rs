use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};

use super::PasteStore;
use crate::error::ApiError;
use crate::models::Paste;

/// Process-local store. Contents do not survive a restart.
///
/// Both maps are sharded, so operations on one id only contend with ids that
/// hash to the same shard.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    live: DashMap<String, Arc<Entry>>,
    /// Every id ever inserted, kept after deletion so ids are never reissued.
    issued: DashSet<String>,
    next_seq: AtomicU64,
    visits: AtomicU64,
}

struct Entry {
    paste: Paste,
    seq: u64,
    views: AtomicI64,
}

impl Entry {
    fn snapshot(&self) -> Paste {
        Paste {
            views: self.views.load(Ordering::Acquire),
            ..self.paste.clone()
        }
    }

    fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.paste
            .expires_at
            .map_or(true, |expires_at| expires_at > now)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the entry out so no shard guard outlives the lookup.
    fn entry(&self, id: &str) -> crate::ApiResult<Arc<Entry>> {
        self.inner
            .live
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(ApiError::NotFound)
    }

    fn live_entries(&self, now: DateTime<Utc>) -> Vec<Arc<Entry>> {
        self.inner
            .live
            .iter()
            .filter(|entry| entry.value().is_live_at(now))
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl PasteStore for MemoryStore {
    async fn insert(&self, paste: &Paste) -> crate::ApiResult<()> {
        if !self.inner.issued.insert(paste.id.clone()) {
            return Err(ApiError::DuplicateId);
        }

        let seq = self.inner.next_seq.fetch_add(1, Ordering::AcqRel);
        self.inner.live.insert(
            paste.id.clone(),
            Arc::new(Entry {
                views: AtomicI64::new(paste.views),
                paste: paste.clone(),
                seq,
            }),
        );

        Ok(())
    }

    async fn get(&self, id: &str) -> crate::ApiResult<Paste> {
        Ok(self.entry(id)?.snapshot())
    }

    async fn increment_views(&self, id: &str) -> crate::ApiResult<i64> {
        let entry = self.entry(id)?;
        Ok(entry.views.fetch_add(1, Ordering::AcqRel) + 1)
    }

    async fn delete(&self, id: &str) -> crate::ApiResult<bool> {
        Ok(self.inner.live.remove(id).is_some())
    }

    async fn delete_expired_before(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        let mut removed = 0;
        self.inner.live.retain(|_, entry| {
            let keep = entry.is_live_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }

    async fn list_recent(&self, limit: usize, now: DateTime<Utc>) -> crate::ApiResult<Vec<Paste>> {
        let mut entries = self.live_entries(now);
        entries.sort_by(|a, b| {
            b.paste
                .created_at
                .cmp(&a.paste.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        Ok(entries
            .into_iter()
            .take(limit)
            .map(|entry| entry.snapshot())
            .collect())
    }

    async fn count_live(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        let count = self
            .inner
            .live
            .iter()
            .filter(|entry| entry.value().is_live_at(now))
            .count();
        Ok(count as u64)
    }

    async fn load_visit_count(&self) -> crate::ApiResult<u64> {
        Ok(self.inner.visits.load(Ordering::Acquire))
    }

    async fn save_visit_count(&self, count: u64) -> crate::ApiResult<()> {
        self.inner.visits.fetch_max(count, Ordering::AcqRel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tokio::task::JoinSet;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap()
    }

    fn paste(id: &str, created_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Paste {
        Paste {
            id: id.to_owned(),
            secret_hash: "hash".to_owned(),
            title: Some(format!("title {id}")),
            content: format!("content of {id}"),
            language: "rust".to_owned(),
            created_at,
            expires_at,
            views: 0,
        }
    }

    #[tokio::test]
    async fn get_returns_record_regardless_of_expiry() {
        let store = MemoryStore::new();
        let expired = paste("expired1", now(), Some(now() - Duration::minutes(1)));
        store.insert(&expired).await.expect("insert");

        assert_eq!(store.get("expired1").await.expect("get"), expired);
    }

    #[tokio::test]
    async fn ids_are_never_reissued() {
        let store = MemoryStore::new();
        store.insert(&paste("abcdefgh", now(), None)).await.expect("insert");

        assert!(matches!(
            store.insert(&paste("abcdefgh", now(), None)).await,
            Err(ApiError::DuplicateId)
        ));

        assert!(store.delete("abcdefgh").await.expect("delete"));
        assert!(matches!(
            store.insert(&paste("abcdefgh", now(), None)).await,
            Err(ApiError::DuplicateId)
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.insert(&paste("abcdefgh", now(), None)).await.expect("insert");

        assert!(store.delete("abcdefgh").await.expect("first delete"));
        assert!(!store.delete("abcdefgh").await.expect("second delete"));
        assert!(!store.delete("missing1").await.expect("missing delete"));
        assert!(matches!(store.get("abcdefgh").await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn increment_on_missing_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.increment_views("missing1").await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = MemoryStore::new();
        store.insert(&paste("abcdefgh", now(), None)).await.expect("insert");

        let mut tasks = JoinSet::new();
        for _ in 0..100 {
            let store = store.clone();
            tasks.spawn(async move { store.increment_views("abcdefgh").await });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("task").expect("increment");
        }

        assert_eq!(store.get("abcdefgh").await.expect("get").views, 100);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired() {
        let store = MemoryStore::new();
        store
            .insert(&paste("gone0001", now(), Some(now() - Duration::seconds(1))))
            .await
            .expect("insert");
        store
            .insert(&paste("edge0001", now(), Some(now())))
            .await
            .expect("insert");
        store
            .insert(&paste("live0001", now(), Some(now() + Duration::hours(1))))
            .await
            .expect("insert");
        store.insert(&paste("forever1", now(), None)).await.expect("insert");

        assert_eq!(store.delete_expired_before(now()).await.expect("sweep"), 2);
        assert!(store.get("live0001").await.is_ok());
        assert!(store.get("forever1").await.is_ok());
        assert!(matches!(store.get("edge0001").await, Err(ApiError::NotFound)));
        assert_eq!(store.count_live(now()).await.expect("count"), 2);
    }

    #[tokio::test]
    async fn list_recent_is_newest_first_and_skips_expired() {
        let store = MemoryStore::new();
        store
            .insert(&paste("older001", now() - Duration::minutes(5), None))
            .await
            .expect("insert");
        store
            .insert(&paste("newer001", now() - Duration::minutes(1), None))
            .await
            .expect("insert");
        store
            .insert(&paste("stale001", now(), Some(now())))
            .await
            .expect("insert");

        let listed: Vec<_> = store
            .list_recent(10, now())
            .await
            .expect("list")
            .into_iter()
            .map(|paste| paste.id)
            .collect();
        assert_eq!(listed, ["newer001", "older001"]);

        assert_eq!(store.list_recent(1, now()).await.expect("list").len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_inserts_of_one_id_admit_exactly_one() {
        let store = MemoryStore::new();

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.spawn(async move { store.insert(&paste("contest1", now(), None)).await });
        }

        let mut admitted = 0;
        while let Some(result) = tasks.join_next().await {
            match result.expect("task") {
                Ok(()) => admitted += 1,
                Err(ApiError::DuplicateId) => {}
                Err(err) => panic!("unexpected error: {err}"),
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sweep_runs_alongside_unrelated_writes() {
        let store = MemoryStore::new();
        for i in 0..50 {
            store
                .insert(&paste(&format!("old{i:05}"), now(), Some(now())))
                .await
                .expect("insert");
        }

        let mut tasks = JoinSet::new();
        for i in 0..50 {
            let store = store.clone();
            tasks.spawn(async move {
                let id = format!("new{i:05}");
                store.insert(&paste(&id, now(), None)).await.expect("insert");
                store.increment_views(&id).await
            });
        }
        let sweeper = {
            let store = store.clone();
            tokio::spawn(async move { store.delete_expired_before(now()).await })
        };

        while let Some(result) = tasks.join_next().await {
            assert_eq!(result.expect("task").expect("increment"), 1);
        }
        assert_eq!(sweeper.await.expect("task").expect("sweep"), 50);

        assert_eq!(store.count_live(now()).await.expect("count"), 50);
        assert_eq!(store.get("new00007").await.expect("get").views, 1);
    }

    #[tokio::test]
    async fn visit_count_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.load_visit_count().await.expect("load"), 0);
        store.save_visit_count(12).await.expect("save");
        assert_eq!(store.load_visit_count().await.expect("load"), 12);
    }
}

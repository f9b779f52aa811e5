use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use super::PasteStore;
use crate::error::ApiError;
use crate::models::Paste;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS paste_ids (id TEXT PRIMARY KEY NOT NULL)",
    "CREATE TABLE IF NOT EXISTS pastes (
        id TEXT PRIMARY KEY NOT NULL,
        secret_hash TEXT NOT NULL,
        title TEXT,
        content TEXT NOT NULL,
        language TEXT NOT NULL,
        created_at TEXT NOT NULL,
        expires_at TEXT,
        views INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE INDEX IF NOT EXISTS pastes_expires_at ON pastes (expires_at)",
    "CREATE INDEX IF NOT EXISTS pastes_created_at ON pastes (created_at)",
    "CREATE TABLE IF NOT EXISTS site_stats (
        id INTEGER PRIMARY KEY NOT NULL,
        visit_count INTEGER NOT NULL DEFAULT 0
    )",
];

const PASTE_COLUMNS: &str =
    "id, secret_hash, title, content, language, created_at, expires_at, views";

/// SQL-backed store. Timestamps are written through sqlx's chrono encoding, which keeps them
/// comparable as text.
#[derive(Clone)]
pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    /// Connect to a database by URL and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }

        Ok(Self { pool })
    }
}

impl PasteStore for SqlStore {
    async fn insert(&self, paste: &Paste) -> crate::ApiResult<()> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query("INSERT INTO paste_ids (id) VALUES (?) ON CONFLICT (id) DO NOTHING")
            .bind(&paste.id)
            .execute(&mut tx)
            .await?
            .rows_affected();
        if claimed == 0 {
            tx.rollback().await?;
            return Err(ApiError::DuplicateId);
        }

        sqlx::query(
            "INSERT INTO pastes (id, secret_hash, title, content, language, created_at, \
             expires_at, views) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&paste.id)
        .bind(&paste.secret_hash)
        .bind(&paste.title)
        .bind(&paste.content)
        .bind(&paste.language)
        .bind(paste.created_at)
        .bind(paste.expires_at)
        .bind(paste.views)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> crate::ApiResult<Paste> {
        let paste = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {PASTE_COLUMNS} FROM pastes WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(paste)
    }

    async fn increment_views(&self, id: &str) -> crate::ApiResult<i64> {
        let views = sqlx::query_scalar::<_, i64>(
            "UPDATE pastes SET views = views + 1 WHERE id = ? RETURNING views",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(views)
    }

    async fn delete(&self, id: &str) -> crate::ApiResult<bool> {
        let removed = sqlx::query("DELETE FROM pastes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(removed > 0)
    }

    async fn delete_expired_before(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        let removed = sqlx::query("DELETE FROM pastes WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!("sweep removed {removed} rows");
        Ok(removed)
    }

    async fn list_recent(&self, limit: usize, now: DateTime<Utc>) -> crate::ApiResult<Vec<Paste>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let pastes = sqlx::query_as::<_, Paste>(&format!(
            "SELECT {PASTE_COLUMNS} FROM pastes WHERE expires_at IS NULL OR expires_at > ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(pastes)
    }

    async fn count_live(&self, now: DateTime<Utc>) -> crate::ApiResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pastes WHERE expires_at IS NULL OR expires_at > ?",
        )
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn load_visit_count(&self) -> crate::ApiResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT visit_count FROM site_stats WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn save_visit_count(&self, count: u64) -> crate::ApiResult<()> {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        sqlx::query(
            "INSERT INTO site_stats (id, visit_count) VALUES (1, ?) ON CONFLICT (id) DO UPDATE \
             SET visit_count = MAX(site_stats.visit_count, excluded.visit_count)",
        )
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;
    use tokio::task::JoinSet;

    use super::*;

    async fn open_store() -> (SqlStore, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        let store = SqlStore::connect(&url, 4).await.expect("connect");
        (store, dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 14, 15, 9, 26).unwrap()
    }

    fn paste(id: &str, created_at: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Paste {
        Paste {
            id: id.to_owned(),
            secret_hash: "hash".to_owned(),
            title: None,
            content: format!("fn {id}() {{}}"),
            language: "rust".to_owned(),
            created_at,
            expires_at,
            views: 0,
        }
    }

    #[tokio::test]
    async fn insert_then_get_round_trips_fields() {
        let (store, _dir) = open_store().await;
        let mut original = paste("abcdefgh", now(), Some(now() + Duration::minutes(10)));
        original.title = Some("hello".to_owned());
        store.insert(&original).await.expect("insert");

        assert_eq!(store.get("abcdefgh").await.expect("get"), original);
        assert!(matches!(store.get("missing1").await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn deleted_ids_stay_reserved() {
        let (store, _dir) = open_store().await;
        store.insert(&paste("abcdefgh", now(), None)).await.expect("insert");

        assert!(store.delete("abcdefgh").await.expect("delete"));
        assert!(!store.delete("abcdefgh").await.expect("delete again"));
        assert!(matches!(
            store.insert(&paste("abcdefgh", now(), None)).await,
            Err(ApiError::DuplicateId)
        ));
        assert!(matches!(store.get("abcdefgh").await, Err(ApiError::NotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let (store, _dir) = open_store().await;
        store.insert(&paste("abcdefgh", now(), None)).await.expect("insert");

        let mut tasks = JoinSet::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.spawn(async move { store.increment_views("abcdefgh").await });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("task").expect("increment");
        }

        assert_eq!(store.get("abcdefgh").await.expect("get").views, 20);
        assert!(matches!(
            store.increment_views("missing1").await,
            Err(ApiError::NotFound)
        ));
    }

    #[tokio::test]
    async fn sweep_list_and_count_agree_on_expiry() {
        let (store, _dir) = open_store().await;
        store
            .insert(&paste("gone0001", now() - Duration::hours(2), Some(now() - Duration::hours(1))))
            .await
            .expect("insert");
        store
            .insert(&paste("edge0001", now() - Duration::hours(1), Some(now())))
            .await
            .expect("insert");
        store
            .insert(&paste("live0001", now() - Duration::minutes(2), Some(now() + Duration::hours(1))))
            .await
            .expect("insert");
        store
            .insert(&paste("forever1", now() - Duration::minutes(1), None))
            .await
            .expect("insert");

        assert_eq!(store.count_live(now()).await.expect("count"), 2);
        let listed: Vec<_> = store
            .list_recent(10, now())
            .await
            .expect("list")
            .into_iter()
            .map(|paste| paste.id)
            .collect();
        assert_eq!(listed, ["forever1", "live0001"]);

        assert_eq!(store.delete_expired_before(now()).await.expect("sweep"), 2);
        assert!(store.get("live0001").await.is_ok());
        assert!(matches!(store.get("edge0001").await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn visit_count_persists() {
        let (store, _dir) = open_store().await;
        assert_eq!(store.load_visit_count().await.expect("load"), 0);

        store.save_visit_count(5).await.expect("save");
        store.save_visit_count(9).await.expect("save");
        assert_eq!(store.load_visit_count().await.expect("load"), 9);
    }
}

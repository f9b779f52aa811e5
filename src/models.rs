use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A paste as it is kept in storage.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Paste {
    pub id: String,
    /// SHA-256 hex digest of the secret key handed out at creation.
    pub secret_hash: String,
    pub title: Option<String>,
    pub content: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: i64,
}

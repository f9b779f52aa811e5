use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Paste;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePaste {
    pub title: Option<String>,
    pub content: String,
    pub language: Option<String>,
    /// Minutes until expiry; absent or `0` means never.
    pub expires_in: Option<i64>,
}

/// Paste as shown to readers. Never carries the secret key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteView {
    pub id: String,
    pub title: Option<String>,
    pub content: String,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub views: i64,
}

impl From<Paste> for PasteView {
    fn from(paste: Paste) -> Self {
        PasteView {
            id: paste.id,
            title: paste.title,
            content: paste.content,
            language: paste.language,
            created_at: paste.created_at,
            expires_at: paste.expires_at,
            views: paste.views,
        }
    }
}

/// Creation response, the only place a secret key is ever returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedPaste {
    #[serde(flatten)]
    pub paste: PasteView,
    pub secret_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteSummary {
    pub id: String,
    pub title: Option<String>,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub views: i64,
}

impl From<Paste> for PasteSummary {
    fn from(paste: Paste) -> Self {
        PasteSummary {
            id: paste.id,
            title: paste.title,
            language: paste.language,
            created_at: paste.created_at,
            views: paste.views,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VisitStats {
    pub visit_count: u64,
    pub paste_count: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

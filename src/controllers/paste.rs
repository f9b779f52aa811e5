use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::{Limits, Listing};
use crate::error::{ApiError, ApiResult};
use crate::expiry::{compute_expiry, is_expired, parse_expires_in};
use crate::ids::IdGenerator;
use crate::models::Paste;
use crate::secret::{hash_secret, verify_secret};
use crate::storage::{AnyStore, PasteStore};
use crate::types::api::{CreatePaste, CreatedPaste, PasteSummary, PasteView};

const DEFAULT_LANGUAGE: &str = "plaintext";

/// Paste lifecycle: creation, reads with view counting, keyed deletion and expiry.
#[derive(Clone)]
pub struct PasteService {
    store: AnyStore,
    clock: Arc<dyn Clock>,
    ids: IdGenerator,
    max_id_attempts: u32,
    limits: Limits,
    listing: Listing,
}

impl PasteService {
    pub fn new(
        store: AnyStore,
        clock: Arc<dyn Clock>,
        ids: IdGenerator,
        max_id_attempts: u32,
        limits: Limits,
        listing: Listing,
    ) -> Self {
        PasteService {
            store,
            clock,
            ids,
            max_id_attempts,
            limits,
            listing,
        }
    }

    pub fn store(&self) -> &AnyStore {
        &self.store
    }

    pub fn listing_enabled(&self) -> bool {
        self.listing.enabled
    }

    pub async fn create(&self, request: CreatePaste) -> ApiResult<CreatedPaste> {
        let CreatePaste {
            title,
            content,
            language,
            expires_in,
        } = request;

        if content.is_empty() {
            return Err(ApiError::InvalidInput("content must not be empty".to_owned()));
        }
        if content.len() > self.limits.max_content_length {
            return Err(ApiError::InvalidInput(format!(
                "content exceeds maximum of {} bytes",
                self.limits.max_content_length
            )));
        }

        let title = title.filter(|title| !title.trim().is_empty());
        if title
            .as_ref()
            .is_some_and(|title| title.len() > self.limits.max_title_length)
        {
            return Err(ApiError::InvalidInput(format!(
                "title exceeds maximum of {} bytes",
                self.limits.max_title_length
            )));
        }

        // only a client-supplied language is held to the limit
        let language = language.filter(|language| !language.trim().is_empty());
        if language
            .as_ref()
            .is_some_and(|language| language.len() > self.limits.max_language_length)
        {
            return Err(ApiError::InvalidInput(format!(
                "language exceeds maximum of {} bytes",
                self.limits.max_language_length
            )));
        }
        let language = language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_owned());

        let minutes = parse_expires_in(expires_in, self.limits.max_expiry_minutes)?;
        let created_at = self.clock.now();
        let expires_at = compute_expiry(created_at, minutes)?;

        let secret_key = self.ids.new_secret_key();
        let mut paste = Paste {
            id: String::new(),
            secret_hash: hash_secret(&secret_key),
            title,
            content,
            language,
            created_at,
            expires_at,
            views: 0,
        };

        for attempt in 1..=self.max_id_attempts {
            paste.id = self.ids.new_public_id();
            match self.store.insert(&paste).await {
                Ok(()) => {
                    info!(
                        "new paste: id='{id}', language='{language}', size={size}, \
                         expires_at={expires_at:?}",
                        id = paste.id,
                        language = paste.language,
                        size = paste.content.len(),
                        expires_at = paste.expires_at,
                    );
                    return Ok(CreatedPaste {
                        paste: paste.into(),
                        secret_key,
                    });
                }
                Err(ApiError::DuplicateId) => {
                    warn!("paste id collision on attempt {attempt}, drawing again");
                }
                Err(err) => return Err(err),
            }
        }

        error!(
            "could not allocate a paste id in {} attempts, id space may be too small",
            self.max_id_attempts
        );
        Err(ApiError::IdsExhausted {
            attempts: self.max_id_attempts,
        })
    }

    /// Fetch a live paste and count the view. The returned count includes this view.
    pub async fn fetch(&self, id: &str) -> ApiResult<PasteView> {
        let now = self.clock.now();
        let mut paste = self.live_paste(id, now).await?;

        paste.views = self.store.increment_views(id).await?;
        Ok(paste.into())
    }

    /// Delete a paste if `secret_key` matches the one issued at creation.
    pub async fn delete(&self, id: &str, secret_key: &str) -> ApiResult<()> {
        let now = self.clock.now();
        let paste = self.live_paste(id, now).await?;

        if !verify_secret(secret_key, &paste.secret_hash) {
            info!("rejected delete of paste '{id}': wrong secret key");
            return Err(ApiError::Forbidden);
        }

        if !self.store.delete(id).await? {
            // lost a race with another delete or the sweep
            return Err(ApiError::NotFound);
        }

        info!("deleted paste '{id}'");
        Ok(())
    }

    /// Most recent live pastes, newest first, without content.
    pub async fn list_recent(&self, limit: Option<usize>) -> ApiResult<Vec<PasteSummary>> {
        let now = self.clock.now();
        let limit = limit
            .unwrap_or(self.listing.default_limit)
            .min(self.listing.max_limit);

        let pastes = self.store.list_recent(limit, now).await?;
        Ok(pastes
            .into_iter()
            .filter(|paste| !is_expired(paste, now))
            .map(PasteSummary::from)
            .collect())
    }

    pub async fn count(&self) -> ApiResult<u64> {
        self.store.count_live(self.clock.now()).await
    }

    /// Remove every expired paste from storage.
    pub async fn purge_expired(&self) -> ApiResult<u64> {
        let count = self.store.delete_expired_before(self.clock.now()).await?;
        if count > 0 {
            info!("purged {count} expired pastes");
        }
        Ok(count)
    }

    /// Look up a paste that is live at `now`. Expired records are reclaimed on the way.
    async fn live_paste(&self, id: &str, now: DateTime<Utc>) -> ApiResult<Paste> {
        let paste = self.store.get(id).await?;

        if is_expired(&paste, now) {
            debug!("paste '{id}' expired at {:?}, reclaiming", paste.expires_at);
            self.store.delete(id).await?;
            return Err(ApiError::NotFound);
        }

        Ok(paste)
    }
}

use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tracing::info;

pub mod clock;
pub mod commands;
pub mod config;
pub mod controllers;
pub mod counter;
pub mod error;
pub mod expiry;
pub mod ids;
pub mod models;
pub mod secret;
pub mod storage;
pub mod types;

pub use error::{ApiError, ApiResult};

use clock::{Clock, SystemClock};
use config::{Config, StorageKind};
use controllers::paste::PasteService;
use counter::VisitCounter;
use ids::IdGenerator;
use storage::{AnyStore, MemoryStore, PasteStore};

/// Everything a command needs, built once at start-up and shared by handle.
#[derive(Clone, FromRef)]
pub struct App {
    pub config: Config,
    pub pastes: PasteService,
    pub visits: Arc<VisitCounter>,
}

impl App {
    pub async fn init(config: Config) -> anyhow::Result<Self> {
        let store: AnyStore = match config.storage.kind {
            StorageKind::Memory => MemoryStore::new().into(),
            #[cfg(feature = "sqlite")]
            StorageKind::Sql => {
                storage::SqlStore::connect(&config.database.url, config.database.max_connections)
                    .await
                    .context("failed to connect to database")?
                    .into()
            }
            #[cfg(not(feature = "sqlite"))]
            StorageKind::Sql => anyhow::bail!("built without SQL storage support"),
        };
        info!("using {:?} paste storage", config.storage.kind);

        Self::with_store(config, store, Arc::new(SystemClock)).await
    }

    /// Assemble the app around an existing store and clock.
    pub async fn with_store(
        config: Config,
        store: AnyStore,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let visits = store
            .load_visit_count()
            .await
            .context("failed to load visit count")?;

        let pastes = PasteService::new(
            store,
            clock,
            IdGenerator::new(config.ids.length),
            config.ids.max_attempts,
            config.limits.clone(),
            config.listing.clone(),
        );

        Ok(App {
            config,
            pastes,
            visits: Arc::new(VisitCounter::new(visits)),
        })
    }

    /// Write the in-memory visit total back to the store.
    pub async fn persist_visits(&self) -> ApiResult<()> {
        self.pastes
            .store()
            .save_visit_count(self.visits.current())
            .await
    }
}

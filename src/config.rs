use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub database: Database,
    pub storage: Storage,
    pub limits: Limits,
    pub ids: Ids,
    pub listing: Listing,
    pub sweep: Sweep,
    pub cors: Cors,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Server {
    pub bind: SocketAddr,
}

impl Default for Server {
    fn default() -> Self {
        Server {
            bind: SocketAddr::from(([127, 0, 0, 1], 8000)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

impl Default for Database {
    fn default() -> Self {
        Database {
            url: "sqlite://pastes.db?mode=rwc".to_owned(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Storage {
    pub kind: StorageKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Memory,
    #[default]
    Sql,
}

/// Size and range limits applied to incoming pastes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum paste content size in bytes.
    pub max_content_length: usize,
    pub max_title_length: usize,
    pub max_language_length: usize,
    /// Longest accepted `expires_in`, in minutes.
    pub max_expiry_minutes: u32,
    /// Maximum request body size in bytes, enforced before any handler runs.
    pub max_request_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_content_length: 512 * 1024,
            max_title_length: 255,
            max_language_length: 50,
            max_expiry_minutes: 525_600,
            max_request_size: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ids {
    pub length: usize,
    pub max_attempts: u32,
}

impl Default for Ids {
    fn default() -> Self {
        Ids {
            length: 8,
            max_attempts: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Listing {
    pub enabled: bool,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for Listing {
    fn default() -> Self {
        Listing {
            enabled: false,
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Sweep {
    /// Seconds between expired-paste sweeps; `0` turns the sweep off.
    pub interval_secs: u64,
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

impl Default for Cors {
    fn default() -> Self {
        Cors {
            allowed_origins: vec![
                "http://localhost:5173".to_owned(),
                "http://127.0.0.1:5173".to_owned(),
                "http://localhost:3000".to_owned(),
            ],
        }
    }
}

impl Config {
    /// Load the config file at `path`, falling back to defaults if it does not exist, then
    /// apply environment overrides.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();

        let mut config: Config = match tokio::fs::read_to_string(path).await {
            Ok(source) => toml::from_str(&source)
                .with_context(|| format!("failed to parse {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("no config file at {}, using defaults", path.display());
                Config::default()
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("DATABASE_URL").filter(|url| !url.is_empty()) {
            self.database.url = url;
        }

        if let Some(origins) = var("ALLOWED_ORIGINS") {
            self.cors.allowed_origins.extend(
                origins
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned),
            );
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (6..=16).contains(&self.ids.length),
            "ids.length must be between 6 and 16, got {}",
            self.ids.length
        );
        anyhow::ensure!(self.ids.max_attempts > 0, "ids.max_attempts must be positive");
        anyhow::ensure!(
            self.limits.max_content_length > 0,
            "limits.max_content_length must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults_for_missing_sections() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            kind = "memory"

            [limits]
            max_content_length = 1024
            "#,
        )
        .expect("parse");

        assert_eq!(config.storage.kind, StorageKind::Memory);
        assert_eq!(config.limits.max_content_length, 1024);
        assert_eq!(config.limits.max_title_length, 255);
        assert_eq!(config.ids.length, 8);
        assert!(!config.listing.enabled);
    }

    #[test]
    fn env_overrides_database_url_and_extends_origins() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            "DATABASE_URL" => Some("sqlite://other.db".to_owned()),
            "ALLOWED_ORIGINS" => Some("https://paste.example, ,https://b.example".to_owned()),
            _ => None,
        });

        assert_eq!(config.database.url, "sqlite://other.db");
        assert!(config
            .cors
            .allowed_origins
            .contains(&"https://paste.example".to_owned()));
        assert!(config
            .cors
            .allowed_origins
            .contains(&"https://b.example".to_owned()));
        assert_eq!(config.cors.allowed_origins.len(), 5);
    }

    #[test]
    fn rejects_unusable_id_length() {
        let mut config = Config::default();
        config.ids.length = 3;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config::load(dir.path().join("absent.toml"))
            .await
            .expect("load");
        assert_eq!(config.sweep.interval_secs, 60);
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::constants::{cache, catalog};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub catalog: CatalogConfig,

    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,

    /// API key for the metadata catalog. The `TRACKARR_API_KEY`
    /// environment variable takes precedence when set.
    pub api_key: String,

    pub timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: catalog::DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout_seconds: catalog::DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Minutes before a cached catalog entry is considered stale.
    pub staleness_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            staleness_minutes: cache::METADATA_STALENESS_MINUTES,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            catalog: CatalogConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("could not determine config directory")?;
        Ok(dir.join("trackarr").join("config.toml"))
    }

    /// Loads the config file, falling back to defaults when none exists.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.catalog.base_url.is_empty(),
            "catalog.base_url must not be empty"
        );
        anyhow::ensure!(
            self.catalog.timeout_seconds > 0,
            "catalog.timeout_seconds must be positive"
        );
        anyhow::ensure!(
            self.cache.staleness_minutes > 0,
            "cache.staleness_minutes must be positive"
        );
        Ok(())
    }

    /// Effective catalog API key, preferring the environment.
    #[must_use]
    pub fn catalog_api_key(&self) -> String {
        std::env::var("TRACKARR_API_KEY").unwrap_or_else(|_| self.catalog.api_key.clone())
    }

    #[must_use]
    pub const fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.cache.staleness_minutes * 60)
    }

    #[must_use]
    pub const fn catalog_timeout(&self) -> Duration {
        Duration::from_secs(self.catalog.timeout_seconds)
    }
}

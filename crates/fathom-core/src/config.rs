//! Store and summary configuration
//!
//! ## Configuration Resolution
//!
//! Settings are layered, later layers winning:
//! 1. Embedded defaults (`config/fathom.toml`, compiled into the binary)
//! 2. Override file: an explicit path, or
//!    `~/.local/share/fathom/config/fathom.toml` when it exists
//! 3. Environment variables (`ELASTICSEARCH_*`, `FATHOM_TIMEOUT_SECS`)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::store::QueryOptions;
use crate::summary::DEFAULT_BUCKET_SIZE;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/fathom.toml");

/// Connection settings for the transaction store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub host: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub api_key: Option<String>,
    pub verify_certs: bool,
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost:9200".to_string(),
            index: "banking_transactions".to_string(),
            username: None,
            password: None,
            api_key: None,
            verify_certs: false,
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Default per-call options (a zero timeout disables the bound)
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            timeout: (self.timeout_secs > 0).then(|| self.timeout()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryConfig {
    pub bucket_size: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub store: StoreConfig,
    pub summary: SummaryConfig,
}

impl Config {
    /// Resolve configuration from files and the process environment
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        config.apply_toml(DEFAULT_CONFIG)?;

        let path = match override_path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => default_config_path().filter(|p| p.exists()),
        };
        if let Some(path) = path {
            debug!("Loading config override from {}", path.display());
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("failed to read {}: {}", path.display(), e))
            })?;
            config.apply_toml(&content)?;
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply a TOML document over the current values
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)?;

        if let Some(store) = raw.store {
            if let Some(host) = store.host {
                self.store.host = host;
            }
            if let Some(index) = store.index {
                self.store.index = index;
            }
            if store.username.is_some() {
                self.store.username = store.username;
            }
            if store.password.is_some() {
                self.store.password = store.password;
            }
            if store.api_key.is_some() {
                self.store.api_key = store.api_key;
            }
            if let Some(verify) = store.verify_certs {
                self.store.verify_certs = verify;
            }
            if let Some(timeout) = store.timeout_secs {
                self.store.timeout_secs = timeout;
            }
        }

        if let Some(summary) = raw.summary {
            if let Some(size) = summary.bucket_size {
                if size == 0 {
                    return Err(Error::Config("summary.bucket_size must be positive".into()));
                }
                self.summary.bucket_size = size;
            }
        }

        Ok(())
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = var("ELASTICSEARCH_HOST") {
            self.store.host = host;
        }
        if let Some(index) = var("ELASTICSEARCH_INDEX") {
            self.store.index = index;
        }
        if let Some(username) = var("ELASTICSEARCH_USERNAME") {
            self.store.username = Some(username);
        }
        if let Some(password) = var("ELASTICSEARCH_PASSWORD") {
            self.store.password = Some(password);
        }
        if let Some(api_key) = var("ELASTICSEARCH_API_KEY") {
            self.store.api_key = Some(api_key);
        }
        if let Some(timeout) = var("FATHOM_TIMEOUT_SECS") {
            self.store.timeout_secs = timeout.trim().parse().map_err(|_| {
                Error::Config(format!("FATHOM_TIMEOUT_SECS is not a number: {}", timeout))
            })?;
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("fathom").join("config").join("fathom.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    store: Option<RawStore>,
    summary: Option<RawSummary>,
}

#[derive(Debug, Deserialize)]
struct RawStore {
    host: Option<String>,
    index: Option<String>,
    username: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
    verify_certs: Option<bool>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    bucket_size: Option<usize>,
}

//! Deployment configuration.
//!
//! Holds the deploy version, the application scope, the core-asset manifest
//! and the strategy timeouts. Stored as JSON, by default at
//! `~/.config/sheetcache/config.json`; every field has a default so a
//! partial file is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::guard::ContentTypeGuard;
use crate::lifecycle::Manifest;
use crate::net::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::version::Version;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sheetcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Navigation gives up on the network after this long and serves the offline page
const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 4000;

/// The page checks for a new deploy once an hour
const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    /// Base URL the application is served from; same-origin checks use its origin
    pub scope: String,
    /// Script path of the interception layer, relative to the page directory
    pub script: String,
    pub shell_page: String,
    pub offline_page: String,
    /// Everything else that must be cached for an install to succeed
    pub core_assets: Vec<String>,
    pub navigation_timeout_ms: u64,
    pub update_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub data_content_types: Vec<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            scope: "http://localhost:8080/".to_string(),
            script: "sw.js".to_string(),
            shell_page: "./index.html".to_string(),
            offline_page: "./offline.html".to_string(),
            core_assets: vec![
                "./styles.css".to_string(),
                "./main.js".to_string(),
                "./manifest.json".to_string(),
            ],
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_content_types: vec![
                "text/csv".to_string(),
                "text/tab-separated-values".to_string(),
                "application/json".to_string(),
            ],
            cache_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location. A missing default file
    /// yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::config_path()?;
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn validate(&self) -> Result<()> {
        self.version()?;
        self.scope_url()?;
        if self.navigation_timeout_ms == 0 {
            anyhow::bail!("navigation_timeout_ms must be greater than zero");
        }
        if self.update_interval_secs == 0 {
            anyhow::bail!("update_interval_secs must be greater than zero");
        }
        Ok(())
    }

    pub fn version(&self) -> Result<Version> {
        Version::parse(&self.version).context("Invalid deploy version")
    }

    pub fn scope_url(&self) -> Result<Url> {
        let url = Url::parse(&self.scope)
            .with_context(|| format!("Invalid scope URL: {}", self.scope))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("Scope URL cannot be used as a base: {}", self.scope);
        }
        Ok(url)
    }

    pub fn manifest(&self) -> Manifest {
        Manifest {
            shell_page: self.shell_page.clone(),
            offline_page: self.offline_page.clone(),
            assets: self.core_assets.clone(),
        }
    }

    pub fn content_guard(&self) -> ContentTypeGuard {
        ContentTypeGuard::new(&self.data_content_types)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

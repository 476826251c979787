//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the API base URL, the last used username and the
//! pagination/cache tuning knobs.
//!
//! Configuration is stored at `~/.config/eventdesk/config.json`. Values from
//! the environment (or a `.env` file loaded by the binary) take precedence:
//! `EVENTDESK_API_URL`, `EVENTDESK_USERNAME`, `EVENTDESK_PASSWORD`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "eventdesk";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Cached query results are reused without refetching for this long
const DEFAULT_STALE_AFTER_SECS: u64 = 30;

pub const ENV_API_URL: &str = "EVENTDESK_API_URL";
pub const ENV_USERNAME: &str = "EVENTDESK_USERNAME";
pub const ENV_PASSWORD: &str = "EVENTDESK_PASSWORD";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub last_username: Option<String>,
    /// Bound "next page" by the server's total count instead of short-page inference
    #[serde(default)]
    pub use_total_count: bool,
    pub stale_after_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
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

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Effective API base URL: environment, then config file, then the default
    pub fn api_base_url(&self) -> String {
        Self::resolve(std::env::var(ENV_API_URL).ok(), self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Username to pre-fill the login form with
    pub fn username(&self) -> Option<String> {
        Self::resolve(std::env::var(ENV_USERNAME).ok(), self.last_username.clone())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs.unwrap_or(DEFAULT_STALE_AFTER_SECS))
    }

    fn resolve(env: Option<String>, file: Option<String>) -> Option<String> {
        env.filter(|v| !v.trim().is_empty())
            .or_else(|| file.filter(|v| !v.trim().is_empty()))
    }
}

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::models::EventsResponse;

/// Saved registrations older than this are not restored at startup.
const CACHE_STALE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > CACHE_STALE_MINUTES
    }
}

/// JSON snapshots of the last pages seen, so the table has something to show
/// before the first network round trip completes.
pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    // ===== Event pages =====

    pub fn load_events_page(&self, page: u32) -> Result<Option<CachedData<EventsResponse>>> {
        self.load(&format!("events_page_{}", page))
    }

    pub fn save_events_page(&self, page: u32, response: &EventsResponse) -> Result<()> {
        // Never persist a payload the server got wrong
        if response.invalid {
            return Ok(());
        }
        self.save(&format!("events_page_{}", page), response)
    }

    // ===== Registrations =====

    pub fn load_registered(&self) -> Result<Option<CachedData<HashSet<Uuid>>>> {
        self.load("registered")
    }

    pub fn save_registered(&self, registered: &HashSet<Uuid>) -> Result<()> {
        self.save("registered", registered)
    }

    /// Remove every snapshot, e.g. on logout
    pub fn clear(&self) -> Result<()> {
        for entry in std::fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            let is_snapshot = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("events_page_") || n == "registered.json")
                .unwrap_or(false);
            if is_snapshot {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    // ===== Cache Age Information =====

    /// Age of the first page snapshot, for the status bar
    pub fn events_age(&self) -> String {
        match self.load_events_page(1) {
            Ok(Some(cached)) => cached.age_display(),
            Ok(None) => "never".to_string(),
            Err(e) => {
                debug!(error = %e, "Failed to load cache for age display");
                "never".to_string()
            }
        }
    }
}

//! Advisory on-disk cache for API responses
//!
//! A key-value store with TTL expiry, one JSON envelope file per key.
//! The cache is purely advisory: a read failure is a miss, a write
//! failure is a no-op, and neither ever propagates to the caller.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Envelope stored on disk for each cached entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    expires_at: DateTime<Utc>,
    value: serde_json::Value,
}

/// File-backed cache with TTL-based expiration
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    default_ttl_secs: u64,
}

impl CacheStore {
    /// Open (creating if needed) a cache rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>, default_ttl_secs: u64) -> Self {
        let dir = dir.into();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Could not create cache directory {}: {}", dir.display(), e);
        }
        Self {
            dir,
            default_ttl_secs,
        }
    }

    /// Cache under the default per-user location
    pub fn default_location(default_ttl_secs: u64) -> Self {
        let dir = dirs_home()
            .map(|h| h.join(".pkg-health").join("cache"))
            .unwrap_or_else(|| PathBuf::from(".pkg-health-cache"));
        Self::new(dir, default_ttl_secs)
    }

    /// Fetch a cached value. Absent, expired, or unreadable entries are
    /// all just misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let content = std::fs::read_to_string(&path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding corrupt cache entry {}: {}", path.display(), e);
                let _ = std::fs::remove_file(&path);
                return None;
            }
        };

        if entry.expires_at <= Utc::now() {
            debug!("Cache entry expired: {}", key);
            let _ = std::fs::remove_file(&path);
            return None;
        }

        serde_json::from_value(entry.value).ok()
    }

    /// Store a value with an explicit TTL. Best-effort: failures are
    /// logged and swallowed.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                warn!("Could not serialize cache value for {}: {}", key, e);
                return;
            }
        };

        let entry = CacheEntry {
            expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
            value,
        };

        let path = self.entry_path(key);
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!("Could not write cache entry {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("Could not encode cache entry for {}: {}", key, e),
        }
    }

    /// Store a value with the default TTL
    pub fn set_default<T: Serialize>(&self, key: &str, value: &T) {
        self.set(key, value, self.default_ttl_secs);
    }

    /// Delete all expired entries; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut removed = 0;
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return 0;
        };

        let now = Utc::now();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let expired = std::fs::read_to_string(&path)
                .ok()
                .and_then(|c| serde_json::from_str::<CacheEntry>(&c).ok())
                .map(|e| e.expires_at <= now)
                // Unreadable entries get purged too
                .unwrap_or(true);
            if expired && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        removed
    }

    /// Delete everything in the cache; returns how many entries went away
    pub fn clear(&self) -> usize {
        let mut removed = 0;
        if let Ok(entries) = std::fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("json")
                    && std::fs::remove_file(&path).is_ok()
                {
                    removed += 1;
                }
            }
        }
        removed
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Turn an arbitrary cache key into a safe filename
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

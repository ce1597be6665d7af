// Cache store for reading and writing cache entries.
// Handles JSON serialization, TTL checking, and atomic filesystem writes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::Result;

/// Default TTL when a caller does not pick one: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Distinguishes temp files of concurrent writers within this process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// A cached value with its key and expiry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    /// Key the entry was stored under.
    pub key: String,
    /// The cached value.
    pub data: T,
    /// When the value was stored.
    pub cached_at: DateTime<Utc>,
    /// Time-to-live in seconds.
    pub ttl_secs: u64,
}

impl<T> CachedData<T> {
    /// Create a new entry stamped with the current time.
    pub fn new(key: impl Into<String>, data: T, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            data,
            cached_at: Utc::now(),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Time elapsed since the entry was stored. Entries from the future count as fresh.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Check if the entry has reached its TTL.
    pub fn is_expired(&self) -> bool {
        self.age() >= Duration::from_secs(self.ttl_secs)
    }

    /// Check if the entry is still valid (not expired).
    pub fn is_valid(&self) -> bool {
        !self.is_expired()
    }
}

/// Entry header without the payload, used for freshness reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryStamp {
    pub cached_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

/// Read a cache entry from a file.
pub fn read_cached<T: DeserializeOwned>(path: &Path) -> Result<Option<CachedData<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let cached: CachedData<T> = serde_json::from_str(&contents)?;
    Ok(Some(cached))
}

/// Read a cache entry, returning None if expired.
pub fn read_if_valid<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_cached::<T>(path)? {
        Some(cached) if cached.is_valid() => Ok(Some(cached.data)),
        _ => Ok(None),
    }
}

/// Read only the timestamp header of an entry.
pub fn read_stamp(path: &Path) -> Result<Option<EntryStamp>> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path)?;
    let stamp: EntryStamp = serde_json::from_str(&contents)?;
    Ok(Some(stamp))
}

/// Write an entry to disk as JSON.
pub fn write_cached<T: Serialize>(path: &Path, entry: &CachedData<T>) -> Result<()> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(entry)?;

    // Write atomically via temp file
    let temp_path = temp_path_for(path);
    let written = (|| -> Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written
}

/// Unique sibling temp path so a rename never exposes a half-written file.
fn temp_path_for(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_extension(format!("{}.{}.tmp", std::process::id(), seq))
}

/// Delete a cache entry.
pub fn delete(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

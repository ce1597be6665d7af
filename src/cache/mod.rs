// Cache module for on-disk TTL caching of normalized feed data.
// Every fetch-backed endpoint reads through `Cache::get_or_fetch`.

pub mod paths;
pub mod store;

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, info, warn};

use crate::error::{MonitorError, Result};

pub use paths::default_cache_dir;
pub use store::{CachedData, DEFAULT_TTL};

/// Per-key population lock.
#[derive(Debug, Default)]
struct Flight {
    lock: tokio::sync::Mutex<()>,
    /// Bumped each time a fetch for the key completes, successful or not.
    generation: AtomicU64,
}

/// File-backed key/value cache with per-key single-flight population.
pub struct Cache {
    dir: PathBuf,
    flights: Mutex<HashMap<String, Arc<Flight>>>,
}

impl Cache {
    /// Open a cache rooted at `dir`, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            MonitorError::Cache(format!("cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self {
            dir,
            flights: Mutex::new(HashMap::new()),
        })
    }

    /// Directory holding the entry files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the stored value if present and within its TTL.
    /// Unreadable or corrupt entries count as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = paths::entry_path(&self.dir, key);
        match store::read_if_valid(&path) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                if let Err(e) = store::delete(&path) {
                    debug!(key, error = %e, "failed to remove cache entry");
                }
                None
            }
        }
    }

    /// Return the stored value regardless of age.
    pub fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = paths::entry_path(&self.dir, key);
        match store::read_cached::<T>(&path) {
            Ok(entry) => entry.map(|e| e.data),
            Err(e) => {
                debug!(key, error = %e, "no usable stale entry");
                None
            }
        }
    }

    /// Store a value under `key` for `ttl`.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let path = paths::entry_path(&self.dir, key);
        let entry = CachedData::new(key, value, ttl);
        store::write_cached(&path, &entry)
            .map_err(|e| MonitorError::Cache(format!("failed to write {}: {}", key, e)))
    }

    /// Age of the stored entry, if any.
    pub fn age(&self, key: &str) -> Option<Duration> {
        let path = paths::entry_path(&self.dir, key);
        let stamp = store::read_stamp(&path).ok().flatten()?;
        Some(
            chrono::Utc::now()
                .signed_duration_since(stamp.cached_at)
                .to_std()
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Serve `key` from cache, or run `fetch` once and store the result.
    ///
    /// Concurrent callers for the same key wait on a single in-flight fetch and
    /// share its outcome. If the fetch fails the last stored value is returned
    /// regardless of age, falling back to `T::default()` when nothing was ever stored.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> T
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key) {
            return value;
        }

        let flight = self.flight(key);
        let seen = flight.generation.load(Ordering::Acquire);
        let _guard = flight.lock.lock().await;

        // Another caller may have populated the key while we waited.
        if let Some(value) = self.get(key) {
            debug!(key, "populated by concurrent fetch");
            return value;
        }
        // A fetch finished while we waited and still left no fresh entry: it failed.
        if flight.generation.load(Ordering::Acquire) != seen {
            debug!(key, "concurrent fetch failed, serving last known data");
            return self.get_stale(key).unwrap_or_default();
        }

        self.populate(key, ttl, fetch, &flight).await
    }

    /// Fetch and store `key` unconditionally, still serialized with other fetches of the key.
    pub async fn refresh<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> T
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let flight = self.flight(key);
        let _guard = flight.lock.lock().await;
        self.populate(key, ttl, fetch, &flight).await
    }

    /// Run `fetch` while holding `flight`'s lock.
    async fn populate<T, F, Fut>(&self, key: &str, ttl: Duration, fetch: F, flight: &Flight) -> T
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let outcome = fetch().await;
        flight.generation.fetch_add(1, Ordering::AcqRel);
        match outcome {
            Ok(value) => {
                if let Err(e) = self.set(key, &value, ttl) {
                    warn!(key, error = %e, "fetched data could not be cached");
                } else {
                    info!(key, "cache refreshed");
                }
                value
            }
            Err(e) => {
                warn!(key, error = %e, "fetch failed, serving last known data");
                self.get_stale(key).unwrap_or_default()
            }
        }
    }

    fn flight(&self, key: &str) -> Arc<Flight> {
        let mut flights = self.flights.lock().unwrap_or_else(|e| e.into_inner());
        flights.entry(key.to_string()).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn open_cache() -> (TempDir, Cache) {
        let dir = TempDir::new().unwrap();
        let cache = Cache::open(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_set_then_get() {
        let (_dir, cache) = open_cache();
        cache
            .set("quakes", &vec!["a".to_string()], DEFAULT_TTL)
            .unwrap();

        let value: Option<Vec<String>> = cache.get("quakes");
        assert_eq!(value, Some(vec!["a".to_string()]));
        assert!(cache.age("quakes").unwrap() < Duration::from_secs(5));
        assert!(cache.age("missing").is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (_dir, cache) = open_cache();
        std::fs::write(paths::entry_path(cache.dir(), "news"), "\u{0}garbage").unwrap();

        let value: Option<Vec<String>> = cache.get("news");
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let (_dir, cache) = open_cache();
        cache.set("news", &vec![1, 2], DEFAULT_TTL).unwrap();

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let value: Vec<i32> = cache
            .get_or_fetch("news", DEFAULT_TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9])
            })
            .await;

        assert_eq!(value, vec![1, 2]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_entry_single_flight() {
        let (_dir, cache) = open_cache();
        cache.set("quakes", &vec![0], Duration::ZERO).unwrap();

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let cache = &cache;
        let requests = (0..8).map(move |_| {
            cache.get_or_fetch("quakes", DEFAULT_TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(vec![7])
            })
        });
        let results: Vec<Vec<i32>> = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &vec![7]));
    }

    #[tokio::test]
    async fn test_failed_fetch_shared_by_waiting_callers() {
        let (_dir, cache) = open_cache();
        cache.set("gdelt", &vec![5], Duration::ZERO).unwrap();

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let cache = &cache;
        let requests = (0..8).map(move |_| {
            cache.get_or_fetch("gdelt", DEFAULT_TTL, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                Err::<Vec<i32>, _>(MonitorError::Parse("upstream down".to_string()))
            })
        });

        let started = std::time::Instant::now();
        let results: Vec<Vec<i32>> = futures::future::join_all(requests).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(1000));
        assert!(results.iter().all(|r| r == &vec![5]));
    }

    #[tokio::test]
    async fn test_failed_fetch_serves_stale() {
        let (_dir, cache) = open_cache();
        cache.set("conflicts", &vec![3], Duration::ZERO).unwrap();

        let value: Vec<i32> = cache
            .get_or_fetch("conflicts", DEFAULT_TTL, || async {
                Err(MonitorError::Parse("bad payload".to_string()))
            })
            .await;

        assert_eq!(value, vec![3]);
    }

    #[tokio::test]
    async fn test_failed_fetch_without_entry_is_empty() {
        let (_dir, cache) = open_cache();

        let value: Vec<i32> = cache
            .get_or_fetch("gdelt", DEFAULT_TTL, || async {
                Err(MonitorError::AllSourcesFailed("gdelt".to_string()))
            })
            .await;

        assert!(value.is_empty());
        assert!(cache.get_stale::<Vec<i32>>("gdelt").is_none());
    }

    #[tokio::test]
    async fn test_refresh_bypasses_fresh_entry() {
        let (_dir, cache) = open_cache();
        cache.set("disasters", &vec![1], DEFAULT_TTL).unwrap();

        let value: Vec<i32> = cache
            .refresh("disasters", DEFAULT_TTL, || async { Ok(vec![2]) })
            .await;

        assert_eq!(value, vec![2]);
        assert_eq!(cache.get::<Vec<i32>>("disasters"), Some(vec![2]));
    }
}

//! TTL cache in front of network reads.
//!
//! Every cached backend read goes through `CacheManager::fetch_with_cache`,
//! which applies one policy:
//!
//! - an entry younger than [`CACHE_TTL`] is returned without touching the network
//! - a missing, stale or unparsable entry triggers a fetch
//! - a successful fetch overwrites the entry; a failed fetch leaves it untouched
//!   and propagates the error (stale data is not served as a fallback)
//!
//! There is no de-duplication of concurrent fetches for the same key. Two
//! overlapping misses both fetch and both write; the last write wins.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::events::{report_persistence_failure, EventSink, PersistenceOp};
use crate::storage::{PersistentStore, StorageError};

/// Freshness window for every cached payload.
pub const CACHE_TTL: Duration = Duration::minutes(3);

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// A payload stamped with its capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub captured_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> CacheEntry<T> {
    /// Fresh if captured less than `CACHE_TTL` ago. An entry stamped in the
    /// future (clock moved backwards) is not fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.captured_at);
        age >= Duration::zero() && age < CACHE_TTL
    }
}

/// Fetch-with-cache over the persistent store.
pub struct CacheManager {
    store: PersistentStore,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl CacheManager {
    pub fn new(store: PersistentStore, clock: Arc<dyn Clock>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, clock, sink }
    }

    /// Return the cached payload for `key` if fresh, otherwise run `fetch`,
    /// store its result and return it.
    pub async fn fetch_with_cache<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(payload) = self.read_fresh::<T>(key) {
            tracing::debug!("Cache hit for '{}'", key);
            return Ok(payload);
        }

        tracing::debug!("Cache miss for '{}', fetching", key);
        let payload = fetch().await?;

        let entry = CacheEntry {
            captured_at: self.clock.now(),
            payload,
        };
        if let Err(e) = self.store.set(key, &entry) {
            report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Write, &e);
        }

        Ok(entry.payload)
    }

    /// Read a fresh entry, treating every failure as a miss.
    fn read_fresh<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get::<CacheEntry<T>>(key) {
            Ok(Some(entry)) if entry.is_fresh(self.clock.now()) => Some(entry.payload),
            Ok(Some(_)) => {
                tracing::debug!("Cache entry '{}' is stale", key);
                None
            }
            Ok(None) => None,
            Err(StorageError::Serialization { message, .. }) => {
                tracing::debug!("Cache entry '{}' is corrupt, refetching: {}", key, message);
                None
            }
            Err(e) => {
                report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Read, &e);
                None
            }
        }
    }

    /// Drop a cached entry so the next read goes to the network.
    pub fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            report_persistence_failure(self.sink.as_ref(), key, PersistenceOp::Remove, &e);
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;

    use super::*;
    use crate::events::{ClientEvent, RecordingSink};
    use crate::storage::MemoryStore;

    struct Fixture {
        cache: CacheManager,
        clock: ManualClock,
        store: PersistentStore,
        backend: Arc<MemoryStore>,
        sink: RecordingSink,
        calls: AtomicUsize,
    }

    impl Fixture {
        fn new() -> Self {
            let backend = Arc::new(MemoryStore::new());
            let store = PersistentStore::new(backend.clone());
            let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
            let sink = RecordingSink::new();
            let cache = CacheManager::new(
                store.clone(),
                Arc::new(clock.clone()),
                Arc::new(sink.clone()),
            );
            Self {
                cache,
                clock,
                store,
                backend,
                sink,
                calls: AtomicUsize::new(0),
            }
        }

        async fn fetch(&self, key: &str, value: &str) -> Result<String, String> {
            self.cache
                .fetch_with_cache(key, || async {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(value.to_string())
                })
                .await
        }

        async fn fail(&self, key: &str) -> Result<String, String> {
            self.cache
                .fetch_with_cache(key, || async {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    Err::<String, _>("offline".to_string())
                })
                .await
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_hit_within_ttl_skips_network() {
        let fx = Fixture::new();

        assert_eq!(fx.fetch("k", "first").await.unwrap(), "first");
        fx.clock.advance(Duration::seconds(179));
        assert_eq!(fx.fetch("k", "second").await.unwrap(), "first");
        assert_eq!(fx.calls(), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_refetches_once() {
        let fx = Fixture::new();

        fx.fetch("k", "first").await.unwrap();
        fx.clock.advance(CACHE_TTL);
        assert_eq!(fx.fetch("k", "second").await.unwrap(), "second");
        assert_eq!(fx.calls(), 2);

        // The refreshed entry is served again
        assert_eq!(fx.fetch("k", "third").await.unwrap(), "second");
        assert_eq!(fx.calls(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let fx = Fixture::new();
        fx.store.set_raw("k", "{\"captured_at\": 12, garbage").unwrap();

        assert_eq!(fx.fetch("k", "fresh").await.unwrap(), "fresh");
        assert_eq!(fx.calls(), 1);
        // Corruption is not a persistence failure
        assert!(fx.sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_payload_shape_is_a_miss() {
        let fx = Fixture::new();
        let entry = CacheEntry {
            captured_at: fx.clock.now(),
            payload: vec![1, 2, 3],
        };
        fx.store.set("k", &entry).unwrap();

        assert_eq!(fx.fetch("k", "text").await.unwrap(), "text");
        assert_eq!(fx.calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_stale_entry() {
        let fx = Fixture::new();

        fx.fetch("k", "old").await.unwrap();
        fx.clock.advance(Duration::minutes(5));

        assert_eq!(fx.fail("k").await.unwrap_err(), "offline");

        let entry: CacheEntry<String> = fx.store.get("k").unwrap().unwrap();
        assert_eq!(entry.payload, "old");

        // Next invocation retries the network
        assert_eq!(fx.fetch("k", "new").await.unwrap(), "new");
        assert_eq!(fx.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_cache_write_still_returns_payload() {
        let fx = Fixture::new();
        fx.backend.set_failing(true);

        assert_eq!(fx.fetch("k", "value").await.unwrap(), "value");

        let failures: Vec<_> = fx
            .sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, ClientEvent::PersistenceFailed { .. }))
            .collect();
        // One failed read, one failed write
        assert_eq!(failures.len(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let fx = Fixture::new();

        fx.fetch("k", "first").await.unwrap();
        fx.cache.invalidate("k");
        assert_eq!(fx.fetch("k", "second").await.unwrap(), "second");
        assert_eq!(fx.calls(), 2);
    }

    #[test]
    fn test_future_stamp_is_not_fresh() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let entry = CacheEntry {
            captured_at: now + Duration::minutes(1),
            payload: (),
        };
        assert!(!entry.is_fresh(now));
    }
}

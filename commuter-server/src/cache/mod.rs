//! Freshness cache for upstream MBTA responses.
//!
//! The upstream API is rate-limited and latency-bearing, so every response is
//! memoized with a per-resource-class staleness window. Coordinate-filtered
//! lookups get one slot per requesting rider rather than per exact path (the
//! lat/lon query values drift with every GPS fix).
//!
//! Expiry is lazy: a stale entry is evicted on the read that discovers it.
//! There is no background sweep; stale entries are never served regardless.

mod clock;
mod policy;
mod store;

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub(crate) use clock::test_support;
pub use policy::{CacheKey, FreshnessPolicy, effective_key, is_coordinate_filtered, policy_for, resource_class};
pub use store::{CacheEntry, CacheStore, FileStore, MemoryStore, StoreError};

/// Memoizes upstream responses in an externally owned [`CacheStore`].
///
/// Store failures are never surfaced: a failed read is a miss and a failed
/// write is a no-op, so the orchestrator always falls through to a live
/// fetch rather than blocking the request.
///
/// `lookup` and `store` are synchronous and may touch the filesystem when
/// backed by a [`FileStore`]; async callers should run them on the blocking
/// pool, as the fetch orchestrator does. Cloning is cheap and shares the
/// underlying store and clock.
#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl FreshnessCache {
    /// Create a cache over the given store, using the system clock.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock (for tests).
    pub fn with_clock(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Return the cached payload for `path`, if present and fresh.
    ///
    /// A stale entry is evicted before reporting a miss.
    pub fn lookup(&self, path: &str, owner_id: Option<&str>) -> Option<Value> {
        let key = policy::effective_key(path, owner_id);

        let entry = match self.store.find(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(path, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(path, error = %e, "cache store read failed, treating as miss");
                return None;
            }
        };

        let age_ms = self.clock.now_ms() - entry.cached_at_ms;
        if age_ms > entry.stale_time_ms {
            debug!(
                path,
                age_ms,
                stale_time_ms = entry.stale_time_ms,
                "cache stale, evicting"
            );
            if let Err(e) = self.store.remove(&key) {
                warn!(path, error = %e, "failed to evict stale cache entry");
            }
            return None;
        }

        debug!(path, age_ms, "cache hit");
        Some(entry.payload)
    }

    /// Remember `payload` for `path`, superseding any entry under the same
    /// effective key.
    ///
    /// The staleness window comes from the fixed per-resource-class policy
    /// table; callers cannot override it.
    pub fn store(&self, path: &str, payload: Value, owner_id: Option<&str>) {
        let policy = policy::policy_for(path);

        // Owner scoping requires an identified principal.
        let owner_id = if policy.owner_scoped {
            owner_id.map(String::from)
        } else {
            None
        };

        let entry = CacheEntry {
            resource_class: policy::resource_class(path).to_string(),
            path: path.to_string(),
            owner_id,
            cached_at_ms: self.clock.now_ms(),
            stale_time_ms: policy.stale_time.as_millis() as i64,
            payload,
        };

        if let Err(e) = self.store.upsert(entry) {
            warn!(path, error = %e, "cache store write failed, continuing uncached");
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::clock::test_support::ManualClock;
    use super::*;

    const NEARBY_A: &str = "/stops?filter[latitude]=42.3601&filter[longitude]=-71.0589&filter[radius]=0.01";
    const NEARBY_B: &str = "/stops?filter[latitude]=42.3612&filter[longitude]=-71.0573&filter[radius]=0.02";

    fn cache_at(now_ms: i64) -> (FreshnessCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::at(now_ms));
        let cache = FreshnessCache::with_clock(store.clone(), clock.clone());
        (cache, store, clock)
    }

    #[test]
    fn repeated_lookups_hit_without_refetch() {
        let (cache, _store, _clock) = cache_at(1_000);

        cache.store("/routes?filter[type]=2", json!([{"id": "CR-Lowell"}]), None);

        let first = cache.lookup("/routes?filter[type]=2", None).unwrap();
        let second = cache.lookup("/routes?filter[type]=2", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, json!([{"id": "CR-Lowell"}]));
    }

    #[test]
    fn entry_at_exact_stale_time_is_still_fresh() {
        let (cache, _store, clock) = cache_at(0);

        cache.store("/vehicles?filter[route_type]=2", json!([]), None);
        clock.set_ms(30_000);

        assert!(cache.lookup("/vehicles?filter[route_type]=2", None).is_some());
    }

    #[test]
    fn stale_entry_is_evicted_not_just_skipped() {
        let (cache, store, clock) = cache_at(0);

        cache.store("/vehicles?filter[route_type]=2", json!([]), None);
        clock.set_ms(30_001);

        assert!(cache.lookup("/vehicles?filter[route_type]=2", None).is_none());
        // The stale read deleted the entry, so the store is empty now.
        assert_eq!(store.len().unwrap(), 0);
        assert!(cache.lookup("/vehicles?filter[route_type]=2", None).is_none());
    }

    #[test]
    fn stale_times_follow_the_policy_table() {
        let (cache, store, _clock) = cache_at(0);

        let cases = [
            ("/schedules?filter[trip]=1", 30 * 60 * 1000),
            ("/predictions?filter[stop]=X", 5 * 60 * 1000),
            ("/vehicles?filter[route_type]=2", 30 * 1000),
            ("/stops/place-north", 5 * 60 * 60 * 1000),
        ];

        for (path, expected_ms) in cases {
            cache.store(path, json!(null), None);
            let entry = store.find(&effective_key(path, None)).unwrap().unwrap();
            assert_eq!(entry.stale_time_ms, expected_ms, "path {path}");
        }
    }

    #[test]
    fn owner_scoping_collapses_path_variance() {
        let (cache, store, _clock) = cache_at(0);

        cache.store(NEARBY_A, json!([{"id": "stop-1"}]), Some("rider-1"));
        cache.store(NEARBY_B, json!([{"id": "stop-2"}]), Some("rider-1"));

        // One slot per owner, regardless of coordinate drift in the path.
        assert_eq!(store.len().unwrap(), 1);

        // Either path variant hits the same slot.
        let via_a = cache.lookup(NEARBY_A, Some("rider-1")).unwrap();
        let via_b = cache.lookup(NEARBY_B, Some("rider-1")).unwrap();
        assert_eq!(via_a, json!([{"id": "stop-2"}]));
        assert_eq!(via_a, via_b);
    }

    #[test]
    fn owners_do_not_collide() {
        let (cache, store, clock) = cache_at(0);

        cache.store(NEARBY_A, json!("for rider 1"), Some("rider-1"));
        clock.set_ms(15_000);
        cache.store(NEARBY_B, json!("for rider 2"), Some("rider-2"));

        assert_eq!(store.len().unwrap(), 2);

        // Past rider 1's freshness window but within rider 2's.
        clock.set_ms(31_000);
        assert!(cache.lookup(NEARBY_A, Some("rider-1")).is_none());
        assert_eq!(
            cache.lookup(NEARBY_B, Some("rider-2")),
            Some(json!("for rider 2"))
        );
    }

    #[test]
    fn anonymous_coordinate_lookup_keys_by_path() {
        let (cache, store, _clock) = cache_at(0);

        cache.store(NEARBY_A, json!(1), None);
        cache.store(NEARBY_B, json!(2), None);

        // Without a principal there is nothing to scope by.
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(cache.lookup(NEARBY_A, None), Some(json!(1)));
    }

    #[test]
    fn store_failures_fail_open() {
        struct FailingStore;

        impl CacheStore for FailingStore {
            fn find(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
                Err(StoreError::Poisoned)
            }
            fn upsert(&self, _entry: CacheEntry) -> Result<(), StoreError> {
                Err(StoreError::Poisoned)
            }
            fn remove(&self, _key: &CacheKey) -> Result<(), StoreError> {
                Err(StoreError::Poisoned)
            }
            fn len(&self) -> Result<usize, StoreError> {
                Err(StoreError::Poisoned)
            }
        }

        let cache = FreshnessCache::new(Arc::new(FailingStore));

        // Neither read nor write may surface an error.
        cache.store("/routes", json!([]), None);
        assert!(cache.lookup("/routes", None).is_none());
    }
}

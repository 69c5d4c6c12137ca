//! Cached fetch orchestration.
//!
//! The single call surface request handlers use to reach upstream data:
//! consult the freshness cache, fetch on a miss or stale entry, write the
//! fresh payload back, return it. Failed fetches are never cached and are
//! never retried here; callers with endpoint-specific knowledge decide what
//! a safe degraded response looks like.
//!
//! Concurrent requests for the same cold key may each fetch independently;
//! there is no single-flight de-duplication. Upstream rate limits are
//! generous relative to expected concurrency, and entries are keyed by
//! resource, so duplicate writes are harmless.

use serde_json::Value;
use tracing::warn;

use crate::cache::FreshnessCache;
use crate::mbta::{MbtaApi, MbtaError};

/// The requesting principal; only its opaque id is used, as the owner of
/// owner-scoped cache entries. Authentication happens elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// MBTA client with response caching.
///
/// Wraps an [`MbtaApi`] implementation and memoizes payloads per the
/// freshness policy table.
pub struct CachedMbtaClient<A: MbtaApi> {
    api: A,
    cache: FreshnessCache,
    cache_disabled: bool,
}

impl<A: MbtaApi> CachedMbtaClient<A> {
    /// Create a new cached client.
    pub fn new(api: A, cache: FreshnessCache) -> Self {
        Self {
            api,
            cache,
            cache_disabled: false,
        }
    }

    /// Bypass the cache entirely (operational escape hatch).
    pub fn with_cache_disabled(mut self, disabled: bool) -> Self {
        self.cache_disabled = disabled;
        self
    }

    /// Fetch an upstream resource, serving from cache when fresh.
    ///
    /// On success the payload is cached under the path's effective key and
    /// returned. On upstream failure nothing is cached and the error
    /// propagates.
    ///
    /// Cache reads and writes run on the blocking pool; a file-backed store
    /// must not do filesystem I/O on the request task.
    pub async fn fetch_resource(
        &self,
        path: &str,
        principal: Option<&Principal>,
    ) -> Result<Value, MbtaError> {
        let owner = principal.map(|p| p.id.to_string());

        if !self.cache_disabled {
            let cache = self.cache.clone();
            let lookup_path = path.to_string();
            let lookup_owner = owner.clone();
            let cached = tokio::task::spawn_blocking(move || {
                cache.lookup(&lookup_path, lookup_owner.as_deref())
            })
            .await
            .unwrap_or_else(|e| {
                warn!(path, error = %e, "cache lookup task failed, treating as miss");
                None
            });
            if let Some(cached) = cached {
                return Ok(cached);
            }
        }

        let payload = self.api.get_json(path).await?;

        let cache = self.cache.clone();
        let store_path = path.to_string();
        let store_payload = payload.clone();
        let write = tokio::task::spawn_blocking(move || {
            cache.store(&store_path, store_payload, owner.as_deref());
        })
        .await;
        if let Err(e) = write {
            warn!(path, error = %e, "cache write task failed, continuing uncached");
        }

        Ok(payload)
    }

    /// Access the underlying client for operations that bypass the cache.
    pub fn api(&self) -> &A {
        &self.api
    }
}

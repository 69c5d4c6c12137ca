//! Freshness policy and cache key derivation.
//!
//! Every upstream path maps to a resource class (its leading segment), and
//! every resource class maps to a fixed staleness window. Coordinate-filtered
//! lookups are additionally keyed by the requesting principal rather than by
//! exact path, because the lat/lon filter values drift with every GPS fix and
//! would otherwise never hit.

use std::time::Duration;

/// 30 seconds: vehicle positions and coordinate-filtered lookups are
/// time-sensitive (a moving train or a moving rider).
const STALE_LIVE: Duration = Duration::from_secs(30);

/// 5 minutes: predictions update frequently but not continuously.
const STALE_PREDICTIONS: Duration = Duration::from_secs(5 * 60);

/// 30 minutes: schedules change rarely within a day and are expensive
/// upstream.
const STALE_SCHEDULES: Duration = Duration::from_secs(30 * 60);

/// 5 hours: static stop metadata (name, accessibility, coordinates) almost
/// never changes.
const STALE_STOPS: Duration = Duration::from_secs(5 * 60 * 60);

/// Freshness policy for one upstream path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshnessPolicy {
    /// Window within which a cached entry may be reused.
    pub stale_time: Duration,

    /// Whether entries are keyed per requesting principal instead of by
    /// exact path.
    pub owner_scoped: bool,
}

/// Effective cache key for an upstream path.
///
/// Ordinary resources are keyed by their full path (query string included).
/// Coordinate-filtered lookups from an identified principal collapse to a
/// single slot per `(resource class, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Path(String),
    Owner {
        resource_class: String,
        owner_id: String,
    },
}

/// Extract the resource class: the leading path segment, query stripped.
///
/// `/vehicles?filter[route_type]=2` → `vehicles`.
pub fn resource_class(path: &str) -> &str {
    let path = path.split('?').next().unwrap_or(path);
    path.split('/').find(|s| !s.is_empty()).unwrap_or("")
}

/// Whether the path filters by both latitude and longitude.
///
/// These are the lookups whose query values drift per request from the same
/// rider, so they get owner-scoped keys and a short staleness window.
pub fn is_coordinate_filtered(path: &str) -> bool {
    match path.split_once('?') {
        Some((_, query)) => {
            query.contains("filter[latitude]") && query.contains("filter[longitude]")
        }
        None => false,
    }
}

/// Look up the freshness policy for a path.
pub fn policy_for(path: &str) -> FreshnessPolicy {
    if is_coordinate_filtered(path) {
        return FreshnessPolicy {
            stale_time: STALE_LIVE,
            owner_scoped: true,
        };
    }

    let stale_time = match resource_class(path) {
        "schedules" => STALE_SCHEDULES,
        "predictions" => STALE_PREDICTIONS,
        "vehicles" => STALE_LIVE,
        "stops" => STALE_STOPS,
        _ => STALE_LIVE,
    };

    FreshnessPolicy {
        stale_time,
        owner_scoped: false,
    }
}

/// Derive the effective cache key for a path and optional principal.
///
/// Owner scoping only applies when a principal is present; an anonymous
/// coordinate-filtered lookup falls back to exact-path keying.
pub fn effective_key(path: &str, owner_id: Option<&str>) -> CacheKey {
    if is_coordinate_filtered(path) {
        if let Some(owner) = owner_id {
            return CacheKey::Owner {
                resource_class: resource_class(path).to_string(),
                owner_id: owner.to_string(),
            };
        }
    }

    CacheKey::Path(path.to_string())
}

//! Injectable time source for the cache.
//!
//! Expiry math is in milliseconds since the Unix epoch so tests can drive it
//! with a manual clock instead of sleeping through staleness windows.

use chrono::Utc;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

//! Application state for the web layer.

use std::sync::Arc;

use crate::fetch::CachedMbtaClient;
use crate::mbta::MbtaClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Cached MBTA API client
    pub mbta: Arc<CachedMbtaClient<MbtaClient>>,
}

impl AppState {
    /// Create a new app state.
    pub fn new(mbta: CachedMbtaClient<MbtaClient>) -> Self {
        Self {
            mbta: Arc::new(mbta),
        }
    }
}

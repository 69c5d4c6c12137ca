use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use commuter_server::cache::{CacheStore, FileStore, FreshnessCache, MemoryStore};
use commuter_server::fetch::CachedMbtaClient;
use commuter_server::mbta::{MbtaClient, MbtaConfig};
use commuter_server::web::{AppState, create_router};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Credentials and knobs from the environment
    let api_key = std::env::var("MBTA_API_KEY").unwrap_or_else(|_| {
        warn!("MBTA_API_KEY not set; upstream calls will be unauthenticated and heavily rate-limited");
        String::new()
    });

    let mut config = MbtaConfig::new(&api_key);
    if let Ok(base_url) = std::env::var("MBTA_API_BASE_URL") {
        config = config.with_base_url(base_url);
    }
    let client = MbtaClient::new(config).expect("Failed to create MBTA client");

    // Persist the cache across restarts when a path is configured
    let store: Arc<dyn CacheStore> = match std::env::var("CACHE_PATH") {
        Ok(path) => {
            info!(path = %path, "using file-backed cache store");
            Arc::new(FileStore::new(path))
        }
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let cache_disabled = std::env::var("DISABLE_CACHE").is_ok_and(|v| v == "true");
    if cache_disabled {
        warn!("response caching is disabled; every request will hit the MBTA API");
    }

    let mbta = CachedMbtaClient::new(client, FreshnessCache::new(store))
        .with_cache_disabled(cache_disabled);

    let state = AppState::new(mbta);
    let app = create_router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("commuter server listening on http://{addr}");
    info!("API endpoints:");
    info!("  GET /health                        - Health check");
    info!("  GET /api/routes                    - Commuter rail routes");
    info!("  GET /api/route-vehicles/:route_id  - Vehicles on a route");
    info!("  GET /api/nearest-vehicles          - Vehicles ranked by distance");
    info!("  GET /api/nearest-stops             - Stops ranked by distance");
    info!("  GET /api/alerts                    - Service alerts");
    info!("  GET /api/vehicle-stops/:vehicle_id - A vehicle's schedule window");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

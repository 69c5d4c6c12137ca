//! HTTP route handlers.
//!
//! Thin JSON endpoints over the cached fetcher and the proximity ranker.
//! Each endpoint owns its own degradation policy: the nearest-* endpoints
//! fall back to an empty list when the upstream is unavailable, the rest
//! surface a JSON error with a 5xx status.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::warn;

use crate::fetch::Principal;
use crate::mbta::{MbtaError, Route, Schedule, Stop, Trip, Vehicle};
use crate::proximity::{Ranked, rank_by_distance};
use crate::schedules::schedule_window;

use super::dto::*;
use super::state::AppState;

/// Header carrying the opaque principal id. Authentication itself happens
/// upstream of this service; the id is only used for owner-scoped caching.
const PRINCIPAL_HEADER: &str = "x-user-id";

/// Active commuter rail vehicles: route type 2, revenue service only.
const COMMUTER_VEHICLES: &str = "/vehicles?filter[route_type]=2&filter[revenue]=REVENUE";

/// Floor for the nearest-stops search radius, in degrees (~1 km).
const MIN_SEARCH_RADIUS_DEG: f64 = 0.01;

/// Ceiling for the nearest-stops search radius, in degrees (~111 km).
const MAX_SEARCH_RADIUS_DEG: f64 = 1.0;

/// Rough meters per degree of latitude, for accuracy scaling.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/routes", get(list_routes))
        .route("/api/route-vehicles/:route_id", get(route_vehicles))
        .route("/api/nearest-vehicles", get(nearest_vehicles))
        .route("/api/nearest-stops", get(nearest_stops))
        .route("/api/alerts", get(alerts))
        .route("/api/vehicle-stops/:vehicle_id", get(vehicle_stops))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Extract the principal from request headers, if identified.
fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
        .map(Principal::new)
}

/// Reject coordinates outside their valid ranges and non-positive accuracy.
fn validate_location(lat: f64, lon: f64, acc: f64) -> Result<(), AppError> {
    let valid = lat.is_finite()
        && lon.is_finite()
        && acc.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
        && acc > 0.0;

    if valid {
        Ok(())
    } else {
        Err(AppError::BadRequest {
            message: "invalid lat/lon/acc query parameters".to_string(),
        })
    }
}

/// Search radius in degrees for a nearest-stops lookup.
///
/// Radius derivation is endpoint policy, not a property of the ranker: by
/// default the reported GPS accuracy is scaled to degrees and clamped to a
/// floor, and callers may override it within the same bounds. A non-finite
/// or non-positive override is ignored rather than forwarded upstream.
fn search_radius_degrees(acc: f64, requested: Option<f64>) -> f64 {
    match requested {
        Some(r) if r.is_finite() && r > 0.0 => r.clamp(MIN_SEARCH_RADIUS_DEG, MAX_SEARCH_RADIUS_DEG),
        _ => (acc / METERS_PER_DEGREE).clamp(MIN_SEARCH_RADIUS_DEG, MAX_SEARCH_RADIUS_DEG),
    }
}

/// Route ids of ranked vehicles, nearest first, deduplicated.
fn nearest_route_ids(ranked: &[Ranked<Vehicle>]) -> Vec<String> {
    let mut route_ids: Vec<String> = Vec::new();
    for vehicle in ranked {
        if let Some(id) = vehicle.entity.relationships.route.as_ref().and_then(|r| r.id())
            && !route_ids.iter().any(|existing| existing == id)
        {
            route_ids.push(id.to_string());
        }
    }
    route_ids
}

fn decode<T: serde::de::DeserializeOwned>(payload: Value, what: &str) -> Result<T, AppError> {
    serde_json::from_value(payload).map_err(|e| AppError::Internal {
        message: format!("unexpected {what} payload: {e}"),
    })
}

/// Commuter rail routes.
async fn list_routes(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RouteSummary>>, AppError> {
    let principal = principal_from_headers(&headers);
    let payload = state
        .mbta
        .fetch_resource("/routes?filter[type]=2", principal.as_ref())
        .await?;

    let routes: Vec<Route> = decode(payload, "routes")?;

    Ok(Json(
        routes
            .into_iter()
            .map(|route| RouteSummary {
                id: route.id,
                name: route.attributes.long_name,
                short_name: route.attributes.short_name,
                description: route.attributes.description,
                color: route.attributes.color,
                text_color: route.attributes.text_color,
                sort_order: route.attributes.sort_order,
            })
            .collect(),
    ))
}

/// Revenue vehicles currently on a route.
async fn route_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(route_id): Path<String>,
) -> Result<Json<Vec<FlatVehicle>>, AppError> {
    let principal = principal_from_headers(&headers);
    let path = format!("/vehicles?filter[route]={route_id}&filter[revenue]=REVENUE");
    let payload = state.mbta.fetch_resource(&path, principal.as_ref()).await?;

    let vehicles: Vec<Vehicle> = decode(payload, "vehicles")?;

    Ok(Json(
        vehicles
            .into_iter()
            .map(|vehicle| FlatVehicle {
                id: vehicle.id,
                attributes: vehicle.attributes,
            })
            .collect(),
    ))
}

/// Commuter rail vehicles ranked by distance from the caller.
///
/// Degrades to an empty list when the upstream is unavailable.
async fn nearest_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<LocationQuery>,
) -> Result<Json<Vec<NearestVehicle>>, AppError> {
    validate_location(query.lat, query.lon, query.acc)?;
    let principal = principal_from_headers(&headers);

    let payload = match state
        .mbta
        .fetch_resource(COMMUTER_VEHICLES, principal.as_ref())
        .await
    {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "nearest-vehicles degrading to empty list");
            return Ok(Json(Vec::new()));
        }
    };

    let vehicles: Vec<Vehicle> = decode(payload, "vehicles")?;
    let ranked = rank_by_distance(vehicles, &query.location());

    Ok(Json(
        ranked
            .into_iter()
            .map(|r| NearestVehicle {
                id: r.entity.id,
                distance: r.distance,
                attributes: r.entity.attributes,
            })
            .collect(),
    ))
}

/// Stops near the caller, ranked by distance.
///
/// The upstream lookup is coordinate-filtered, so for identified callers the
/// cache collapses it to one slot per rider. Degrades to an empty list when
/// the upstream is unavailable.
async fn nearest_stops(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<NearestStopsQuery>,
) -> Result<Json<Vec<NearestStop>>, AppError> {
    validate_location(query.lat, query.lon, query.acc)?;
    let principal = principal_from_headers(&headers);

    let radius = search_radius_degrees(query.acc, query.radius);
    let path = format!(
        "/stops?filter[latitude]={}&filter[longitude]={}&filter[radius]={:.4}",
        query.lat, query.lon, radius
    );

    let payload = match state.mbta.fetch_resource(&path, principal.as_ref()).await {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "nearest-stops degrading to empty list");
            return Ok(Json(Vec::new()));
        }
    };

    let stops: Vec<Stop> = decode(payload, "stops")?;
    let ranked = rank_by_distance(stops, &query.location());

    Ok(Json(
        ranked
            .into_iter()
            .map(|r| NearestStop {
                id: r.entity.id,
                distance: r.distance,
                attributes: r.entity.attributes,
            })
            .collect(),
    ))
}

/// Service alerts, filtered to nearby routes when a location is given.
async fn alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OptionalLocationQuery>,
) -> Result<Json<Value>, AppError> {
    let principal = principal_from_headers(&headers);

    let mut route_ids = Vec::new();
    if let Some(location) = query.location() {
        validate_location(location.lat, location.lon, location.acc)?;

        let payload = state
            .mbta
            .fetch_resource(COMMUTER_VEHICLES, principal.as_ref())
            .await?;
        let vehicles: Vec<Vehicle> = decode(payload, "vehicles")?;
        route_ids = nearest_route_ids(&rank_by_distance(vehicles, &location));
    }

    let path = if route_ids.is_empty() {
        "/alerts".to_string()
    } else {
        format!("/alerts?filter[route]={}", route_ids.join(","))
    };

    let alerts = state.mbta.fetch_resource(&path, principal.as_ref()).await?;
    Ok(Json(alerts))
}

/// A vehicle's surrounding schedule window, each stop hydrated with metadata.
async fn vehicle_stops(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(vehicle_id): Path<String>,
) -> Result<Json<VehicleStopsResponse>, AppError> {
    let principal = principal_from_headers(&headers);

    let payload = state
        .mbta
        .fetch_resource(&format!("/vehicles/{vehicle_id}"), principal.as_ref())
        .await?;
    let vehicle: Vehicle = decode(payload, "vehicle")?;

    let relationships = &vehicle.relationships;
    let (Some(route_id), Some(trip_id), Some(stop_id)) = (
        relationships.route.as_ref().and_then(|r| r.id()),
        relationships.trip.as_ref().and_then(|r| r.id()),
        relationships.stop.as_ref().and_then(|r| r.id()),
    ) else {
        return Err(AppError::NotFound {
            message: format!("vehicle {vehicle_id} has no active trip"),
        });
    };

    let direction_id = vehicle.attributes.direction_id.unwrap_or(0);
    let schedules_path = format!(
        "/schedules?filter[route]={route_id}&filter[trip]={trip_id}&filter[direction_id]={direction_id}"
    );
    let payload = state
        .mbta
        .fetch_resource(&schedules_path, principal.as_ref())
        .await?;
    let schedules: Vec<Schedule> = decode(payload, "schedules")?;

    let window = schedule_window(&schedules, stop_id, Utc::now());

    // Hydrate all window stops in parallel; each /stops/{id} lookup is
    // cached for hours, so repeat vehicles on the same line are cheap.
    let stops = try_join_all(window.iter().map(|schedule| hydrate_stop(&state, principal.as_ref(), schedule)))
        .await?;

    let trip_payload = state
        .mbta
        .fetch_resource(&format!("/trips/{trip_id}"), principal.as_ref())
        .await?;
    let trip: Trip = decode(trip_payload, "trip")?;
    let name = trip.attributes.name.unwrap_or_else(|| vehicle.id.clone());

    Ok(Json(VehicleStopsResponse {
        vehicle: VehicleSummary {
            id: vehicle.id,
            name,
            latitude: vehicle.attributes.latitude,
            longitude: vehicle.attributes.longitude,
            current_status: vehicle.attributes.current_status,
            direction_id: vehicle.attributes.direction_id,
            updated_at: vehicle.attributes.updated_at,
        },
        stops,
    }))
}

/// Fetch stop metadata for one schedule entry.
async fn hydrate_stop(
    state: &AppState,
    principal: Option<&Principal>,
    schedule: &Schedule,
) -> Result<ScheduledStop, AppError> {
    let stop_id = schedule.stop_id().ok_or_else(|| AppError::Internal {
        message: format!("schedule {} has no stop", schedule.id),
    })?;

    let payload = state
        .mbta
        .fetch_resource(&format!("/stops/{stop_id}"), principal)
        .await?;
    let stop: Stop = decode(payload, "stop")?;

    Ok(ScheduledStop {
        id: schedule.id.clone(),
        arrival_time: schedule.attributes.arrival_time.clone(),
        departure_time: schedule.attributes.departure_time.clone(),
        stop_sequence: schedule.attributes.stop_sequence,
        name: stop.attributes.name,
        description: stop.attributes.description,
        municipality: stop.attributes.municipality,
        platform_name: stop.attributes.platform_name,
        latitude: stop.attributes.latitude,
        longitude: stop.attributes.longitude,
        wheelchair_boarding: stop.attributes.wheelchair_boarding,
    })
}

/// Web layer errors.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<MbtaError> for AppError {
    fn from(e: MbtaError) -> Self {
        match e {
            MbtaError::NotFound { path } => AppError::NotFound {
                message: format!("not found: {path}"),
            },
            other => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(status = %status, message = %message, "request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use serde_json::json;

    use super::*;

    #[test]
    fn principal_requires_non_empty_header() {
        let mut headers = HeaderMap::new();
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static(""));
        assert!(principal_from_headers(&headers).is_none());

        headers.insert(PRINCIPAL_HEADER, HeaderValue::from_static("rider-1"));
        assert_eq!(
            principal_from_headers(&headers),
            Some(Principal::new("rider-1"))
        );
    }

    #[test]
    fn location_validation() {
        assert!(validate_location(42.36, -71.05, 20.0).is_ok());
        assert!(validate_location(91.0, -71.05, 20.0).is_err());
        assert!(validate_location(42.36, -181.0, 20.0).is_err());
        assert!(validate_location(42.36, -71.05, 0.0).is_err());
        assert!(validate_location(f64::NAN, -71.05, 20.0).is_err());
    }

    #[test]
    fn radius_scales_accuracy_with_floor() {
        // Explicit override always wins.
        assert_eq!(search_radius_degrees(20.0, Some(0.05)), 0.05);

        // Small accuracy clamps to the floor.
        assert_eq!(search_radius_degrees(20.0, None), MIN_SEARCH_RADIUS_DEG);

        // Large accuracy scales.
        let scaled = search_radius_degrees(5_000.0, None);
        assert!(scaled > MIN_SEARCH_RADIUS_DEG);
        assert!((scaled - 5_000.0 / METERS_PER_DEGREE).abs() < 1e-12);
    }

    #[test]
    fn radius_override_is_bounded() {
        // Overrides outside the valid range are ignored in favor of the
        // accuracy-derived default.
        assert_eq!(search_radius_degrees(20.0, Some(f64::NAN)), MIN_SEARCH_RADIUS_DEG);
        assert_eq!(search_radius_degrees(20.0, Some(f64::INFINITY)), MIN_SEARCH_RADIUS_DEG);
        assert_eq!(search_radius_degrees(20.0, Some(-0.5)), MIN_SEARCH_RADIUS_DEG);
        assert_eq!(search_radius_degrees(20.0, Some(0.0)), MIN_SEARCH_RADIUS_DEG);

        // In-range overrides pass through; oversized ones clamp.
        assert_eq!(search_radius_degrees(20.0, Some(0.5)), 0.5);
        assert_eq!(search_radius_degrees(20.0, Some(500.0)), MAX_SEARCH_RADIUS_DEG);
        assert_eq!(search_radius_degrees(20.0, Some(0.0001)), MIN_SEARCH_RADIUS_DEG);
    }

    #[test]
    fn nearest_route_ids_dedupes_in_rank_order() {
        let vehicle = |id: &str, route: &str| -> Vehicle {
            serde_json::from_value(json!({
                "id": id,
                "attributes": { "latitude": 42.0, "longitude": -71.0 },
                "relationships": { "route": { "data": { "id": route } } }
            }))
            .unwrap()
        };

        let ranked = vec![
            Ranked { entity: vehicle("v1", "CR-Lowell"), distance: 100 },
            Ranked { entity: vehicle("v2", "CR-Fitchburg"), distance: 200 },
            Ranked { entity: vehicle("v3", "CR-Lowell"), distance: 300 },
        ];

        assert_eq!(nearest_route_ids(&ranked), vec!["CR-Lowell", "CR-Fitchburg"]);
    }

    #[test]
    fn app_error_from_mbta_error() {
        let not_found: AppError = MbtaError::NotFound {
            path: "/vehicles/x".into(),
        }
        .into();
        assert!(matches!(not_found, AppError::NotFound { .. }));

        let upstream: AppError = MbtaError::Upstream {
            path: "/routes".into(),
            status: 502,
            message: "bad gateway".into(),
        }
        .into();
        assert!(matches!(upstream, AppError::Internal { .. }));
    }
}

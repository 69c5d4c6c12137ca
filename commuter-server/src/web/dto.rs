//! Data transfer objects for web requests and responses.

use serde::{Deserialize, Serialize};

use crate::mbta::{StopAttributes, VehicleAttributes};
use crate::proximity::UserLocation;

/// Required caller location, from query parameters.
#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub lat: f64,
    pub lon: f64,
    /// Horizontal accuracy radius in meters
    pub acc: f64,
}

impl LocationQuery {
    pub fn location(&self) -> UserLocation {
        UserLocation {
            lat: self.lat,
            lon: self.lon,
            acc: self.acc,
        }
    }
}

/// Optional caller location; present only when all three parameters are.
#[derive(Debug, Default, Deserialize)]
pub struct OptionalLocationQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub acc: Option<f64>,
}

impl OptionalLocationQuery {
    pub fn location(&self) -> Option<UserLocation> {
        match (self.lat, self.lon, self.acc) {
            (Some(lat), Some(lon), Some(acc)) => Some(UserLocation { lat, lon, acc }),
            _ => None,
        }
    }
}

/// Query for the nearest-stops endpoint.
#[derive(Debug, Deserialize)]
pub struct NearestStopsQuery {
    pub lat: f64,
    pub lon: f64,
    pub acc: f64,
    /// Search radius in degrees; derived from `acc` when absent
    pub radius: Option<f64>,
}

impl NearestStopsQuery {
    pub fn location(&self) -> UserLocation {
        UserLocation {
            lat: self.lat,
            lon: self.lon,
            acc: self.acc,
        }
    }
}

/// A commuter rail route summary.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub id: String,
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub sort_order: Option<i64>,
}

/// A vehicle with its attributes flattened alongside its id.
#[derive(Debug, Serialize)]
pub struct FlatVehicle {
    pub id: String,
    #[serde(flatten)]
    pub attributes: VehicleAttributes,
}

/// A vehicle ranked by distance from the caller, trimmed of relationships.
#[derive(Debug, Serialize)]
pub struct NearestVehicle {
    pub id: String,
    /// Meters from the caller's location
    pub distance: u32,
    pub attributes: VehicleAttributes,
}

/// A stop ranked by distance from the caller.
#[derive(Debug, Serialize)]
pub struct NearestStop {
    pub id: String,
    /// Meters from the caller's location
    pub distance: u32,
    pub attributes: StopAttributes,
}

/// Vehicle identity summary for the vehicle-stops response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSummary {
    pub id: String,
    /// Trip name when available, vehicle id otherwise
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub current_status: Option<String>,
    pub direction_id: Option<i64>,
    pub updated_at: Option<String>,
}

/// A scheduled stop hydrated with stop metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledStop {
    pub id: String,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub stop_sequence: i64,
    pub name: String,
    pub description: Option<String>,
    pub municipality: Option<String>,
    pub platform_name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub wheelchair_boarding: Option<i64>,
}

/// Response for the vehicle-stops endpoint.
#[derive(Debug, Serialize)]
pub struct VehicleStopsResponse {
    pub vehicle: VehicleSummary,
    pub stops: Vec<ScheduledStop>,
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

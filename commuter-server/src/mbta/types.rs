//! DTOs for the MBTA V3 API (JSON:API format).
//!
//! Only the resources and fields the handlers actually consume are modelled;
//! everything arrives inside an envelope whose payload is under `data`.

use serde::{Deserialize, Serialize};

use crate::proximity::Locatable;

/// JSON:API response envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope {
    pub data: serde_json::Value,
}

/// Reference to a related resource (`relationships.*.data`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipData {
    pub id: String,
}

/// A single `relationships` slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Relationship {
    pub data: Option<RelationshipData>,
}

impl Relationship {
    /// The related resource id, if the slot is populated.
    pub fn id(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.id.as_str())
    }
}

/// Vehicle position and status attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleAttributes {
    pub latitude: f64,
    pub longitude: f64,
    pub bearing: Option<f64>,
    /// 'STOPPED_AT' | 'IN_TRANSIT_TO' | 'INCOMING_AT'
    pub current_status: Option<String>,
    pub current_stop_sequence: Option<i64>,
    pub direction_id: Option<i64>,
    pub label: Option<String>,
    pub revenue: Option<String>,
    /// Miles per hour
    pub speed: Option<f64>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleRelationships {
    pub route: Option<Relationship>,
    pub trip: Option<Relationship>,
    pub stop: Option<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub attributes: VehicleAttributes,
    #[serde(default)]
    pub relationships: VehicleRelationships,
}

impl Locatable for Vehicle {
    fn latitude(&self) -> f64 {
        self.attributes.latitude
    }
    fn longitude(&self) -> f64 {
        self.attributes.longitude
    }
}

/// Stop metadata attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopAttributes {
    pub name: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub municipality: Option<String>,
    pub platform_name: Option<String>,
    pub wheelchair_boarding: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub attributes: StopAttributes,
}

impl Locatable for Stop {
    fn latitude(&self) -> f64 {
        self.attributes.latitude
    }
    fn longitude(&self) -> f64 {
        self.attributes.longitude
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAttributes {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub sort_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub attributes: RouteAttributes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleAttributes {
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    pub stop_sequence: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleRelationships {
    pub stop: Option<Relationship>,
    pub trip: Option<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub attributes: ScheduleAttributes,
    #[serde(default)]
    pub relationships: ScheduleRelationships,
}

impl Schedule {
    /// The id of the stop this schedule entry belongs to.
    pub fn stop_id(&self) -> Option<&str> {
        self.relationships.stop.as_ref().and_then(|r| r.id())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripAttributes {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: String,
    pub attributes: TripAttributes,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn vehicle_deserializes_from_api_shape() {
        let value = json!({
            "id": "1829",
            "type": "vehicle",
            "attributes": {
                "latitude": 42.3601,
                "longitude": -71.0589,
                "bearing": 190.0,
                "current_status": "IN_TRANSIT_TO",
                "current_stop_sequence": 3,
                "direction_id": 0,
                "label": "1829",
                "revenue": "REVENUE",
                "speed": 25.0,
                "updated_at": "2026-08-30T08:15:00-04:00"
            },
            "relationships": {
                "route": { "data": { "id": "CR-Fitchburg", "type": "route" } },
                "trip": { "data": { "id": "CR-612205", "type": "trip" } },
                "stop": { "data": { "id": "place-portr", "type": "stop" } }
            }
        });

        let vehicle: Vehicle = serde_json::from_value(value).unwrap();
        assert_eq!(vehicle.id, "1829");
        assert_eq!(vehicle.latitude(), 42.3601);
        assert_eq!(
            vehicle.relationships.route.as_ref().and_then(|r| r.id()),
            Some("CR-Fitchburg")
        );
    }

    #[test]
    fn vehicle_tolerates_missing_optionals() {
        let value = json!({
            "id": "1829",
            "attributes": {
                "latitude": 42.0,
                "longitude": -71.0
            }
        });

        let vehicle: Vehicle = serde_json::from_value(value).unwrap();
        assert!(vehicle.attributes.label.is_none());
        assert!(vehicle.relationships.trip.is_none());
    }

    #[test]
    fn schedule_stop_id() {
        let value = json!({
            "id": "schedule-1",
            "attributes": { "stop_sequence": 4, "departure_time": "2026-08-30T09:00:00-04:00" },
            "relationships": { "stop": { "data": { "id": "place-north" } } }
        });

        let schedule: Schedule = serde_json::from_value(value).unwrap();
        assert_eq!(schedule.stop_id(), Some("place-north"));
    }
}

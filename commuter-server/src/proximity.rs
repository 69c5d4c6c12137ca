//! Geographic proximity ranking.
//!
//! Turns a flat list of geo-tagged entities plus a target point into a
//! distance-sorted list. Independent of the caching layer; handlers call it
//! downstream of one or more fetches when they need a "nearest N" answer.

use serde::{Deserialize, Serialize};

/// Earth radius in meters, for the haversine formula.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// The requester's position, as reported by their device.
///
/// Not persisted by this layer; `acc` (horizontal accuracy, meters) is used
/// by endpoints to derive a search radius, never by the ranker itself.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct UserLocation {
    pub lat: f64,
    pub lon: f64,
    pub acc: f64,
}

/// Anything carrying a coordinate.
pub trait Locatable {
    fn latitude(&self) -> f64;
    fn longitude(&self) -> f64;
}

/// An entity augmented with its distance from the target point.
///
/// Serializes with the original entity's fields flattened alongside
/// `distance`, so the augmentation is additive rather than destructive.
#[derive(Debug, Clone, Serialize)]
pub struct Ranked<T> {
    #[serde(flatten)]
    pub entity: T,

    /// Great-circle distance from the target, in whole meters.
    pub distance: u32,
}

/// Haversine great-circle distance between two points, in meters,
/// rounded to the nearest whole meter.
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> u32 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_M * c).round() as u32
}

/// Sort `entities` ascending by distance from `target`.
///
/// The full list is returned; callers apply their own threshold or limit.
/// The sort is stable, so equal-distance entities keep their input order.
/// Callers are responsible for passing well-formed coordinates.
pub fn rank_by_distance<T: Locatable>(entities: Vec<T>, target: &UserLocation) -> Vec<Ranked<T>> {
    let mut ranked: Vec<Ranked<T>> = entities
        .into_iter()
        .map(|entity| {
            let distance = haversine_distance_m(
                target.lat,
                target.lon,
                entity.latitude(),
                entity.longitude(),
            );
            Ranked { entity, distance }
        })
        .collect();

    ranked.sort_by_key(|r| r.distance);
    ranked
}

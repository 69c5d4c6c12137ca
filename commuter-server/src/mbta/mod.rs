//! MBTA V3 API client.
//!
//! The API is a JSON:API resource provider: every response wraps its payload
//! in a `data` field, resources carry `id` / `attributes` / `relationships`,
//! and requests are authenticated with a static key in the `x-api-key`
//! header. The API is rate-limited, which is why everything above this
//! module goes through the freshness cache.

mod client;
mod error;
pub mod mock;
mod types;

use std::future::Future;

use serde_json::Value;

pub use client::{MbtaClient, MbtaConfig};
pub use error::MbtaError;
pub use types::{
    ApiEnvelope, Relationship, RelationshipData, Route, RouteAttributes, Schedule,
    ScheduleAttributes, ScheduleRelationships, Stop, StopAttributes, Trip, TripAttributes,
    Vehicle, VehicleAttributes, VehicleRelationships,
};

/// The upstream fetch seam.
///
/// `MbtaClient` is the production implementation; tests and keyless
/// development use [`mock::MockMbtaApi`].
pub trait MbtaApi: Send + Sync {
    /// GET `path` and return the unwrapped `data` payload.
    fn get_json(&self, path: &str) -> impl Future<Output = Result<Value, MbtaError>> + Send;
}

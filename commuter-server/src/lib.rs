//! Commuter transit data server.
//!
//! Sits between commuter-facing request handlers and the rate-limited MBTA
//! API: memoizes upstream responses with per-resource-class freshness
//! windows, keys coordinate-filtered lookups per rider, and ranks vehicles
//! and stops by great-circle distance from the caller.

pub mod cache;
pub mod fetch;
pub mod mbta;
pub mod proximity;
pub mod schedules;
pub mod web;

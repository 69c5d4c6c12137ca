//! Web layer for the commuter transit server.
//!
//! Thin JSON endpoints over the cached fetcher and the proximity ranker.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::AppState;

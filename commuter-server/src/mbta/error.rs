//! MBTA client error types.

/// Errors from the MBTA HTTP client.
///
/// None of these are retried here; callers decide whether to retry, degrade
/// to an empty result, or propagate. Timeouts surface through `Http`.
#[derive(Debug, thiserror::Error)]
pub enum MbtaError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid or missing API key
    #[error("unauthorized: check MBTA_API_KEY")]
    Unauthorized,

    /// Rate limited by the API
    #[error("rate limited by the MBTA API")]
    RateLimited,

    /// Resource does not exist (bad vehicle/trip/stop id)
    #[error("not found: {path}")]
    NotFound { path: String },

    /// API returned a non-success status
    #[error("upstream fetch failed for {path} ({status}): {message}")]
    Upstream {
        path: String,
        status: u16,
        message: String,
    },

    /// Failed to parse the response envelope
    #[error("JSON parse error: {message}")]
    Json { message: String },
}

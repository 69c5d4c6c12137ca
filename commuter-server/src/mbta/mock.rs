//! Mock MBTA API for testing without network access.
//!
//! Serves canned payloads per path and counts upstream calls, so tests can
//! assert exactly how many fetches a code path performed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use super::MbtaApi;
use super::error::MbtaError;

/// Mock upstream serving pre-registered responses.
#[derive(Debug, Default)]
pub struct MockMbtaApi {
    responses: HashMap<String, Value>,
    failures: HashMap<String, u16>,
    calls: AtomicUsize,
}

impl MockMbtaApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the payload returned for `path`.
    pub fn with_response(mut self, path: impl Into<String>, payload: Value) -> Self {
        self.responses.insert(path.into(), payload);
        self
    }

    /// Register a failing status for `path`.
    pub fn with_failure(mut self, path: impl Into<String>, status: u16) -> Self {
        self.failures.insert(path.into(), status);
        self
    }

    /// Number of upstream calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MbtaApi for MockMbtaApi {
    async fn get_json(&self, path: &str) -> Result<Value, MbtaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(status) = self.failures.get(path) {
            return Err(MbtaError::Upstream {
                path: path.to_string(),
                status: *status,
                message: "mock failure".to_string(),
            });
        }

        match self.responses.get(path) {
            Some(payload) => Ok(payload.clone()),
            None => Err(MbtaError::NotFound {
                path: path.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn serves_registered_responses_and_counts_calls() {
        let mock = MockMbtaApi::new().with_response("/routes", json!([{"id": "CR-Lowell"}]));

        let payload = mock.get_json("/routes").await.unwrap();
        assert_eq!(payload, json!([{"id": "CR-Lowell"}]));

        assert!(matches!(
            mock.get_json("/unknown").await,
            Err(MbtaError::NotFound { .. })
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn registered_failures_surface_with_status() {
        let mock = MockMbtaApi::new().with_failure("/vehicles", 503);

        match mock.get_json("/vehicles").await {
            Err(MbtaError::Upstream { status, path, .. }) => {
                assert_eq!(status, 503);
                assert_eq!(path, "/vehicles");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }
}

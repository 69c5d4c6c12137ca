//! MBTA V3 API HTTP client.
//!
//! Authenticates with a static API key, bounds concurrent requests with a
//! semaphore (the API is rate-limited), and unwraps the JSON:API envelope so
//! callers receive the `data` payload directly.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::sync::Semaphore;

use super::MbtaApi;
use super::error::MbtaError;
use super::types::ApiEnvelope;

/// Default base URL for the MBTA V3 API.
const DEFAULT_BASE_URL: &str = "https://api-v3.mbta.com";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Configuration for the MBTA client.
#[derive(Debug, Clone)]
pub struct MbtaConfig {
    /// API key for the x-api-key header
    pub api_key: String,
    /// Base URL for the API
    pub base_url: String,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl MbtaConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// MBTA V3 API client.
#[derive(Debug, Clone)]
pub struct MbtaClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl MbtaClient {
    /// Create a new client with the given configuration.
    pub fn new(config: MbtaConfig) -> Result<Self, MbtaError> {
        let mut headers = HeaderMap::new();

        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| MbtaError::Json {
            message: "invalid API key format".to_string(),
        })?;
        headers.insert(HeaderName::from_static("x-api-key"), api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
        })
    }

    async fn fetch(&self, path: &str) -> Result<Value, MbtaError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| MbtaError::Upstream {
                path: path.to_string(),
                status: 0,
                message: "semaphore closed".to_string(),
            })?;

        let url = format!("{}{}", self.base_url, path);

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(MbtaError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MbtaError::RateLimited);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MbtaError::NotFound {
                path: path.to_string(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MbtaError::Upstream {
                path: path.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;

        let envelope: ApiEnvelope = serde_json::from_str(&body).map_err(|e| MbtaError::Json {
            message: format!("{} (body: {})", e, body.chars().take(500).collect::<String>()),
        })?;

        Ok(envelope.data)
    }
}

impl MbtaApi for MbtaClient {
    async fn get_json(&self, path: &str) -> Result<Value, MbtaError> {
        self.fetch(path).await
    }
}

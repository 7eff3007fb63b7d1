//! Backend clients for the two processing tiers.

use std::time::Duration;

use async_trait::async_trait;

use super::JobPayload;
use crate::error::RouterError;
use crate::tier::Tier;

/// Upper bound on how much of an error body is kept.
const MAX_ERROR_BODY: usize = 512;

/// Why a single backend call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// HTTP status, when a response arrived
    pub status: Option<u16>,
    pub message: String,
}

impl BackendFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A processing backend for one tier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TierBackend: Send + Sync {
    /// Process the job; `Ok` carries the backend's result payload.
    async fn process(&self, payload: &JobPayload) -> Result<serde_json::Value, BackendFailure>;
}

/// Backend reached over HTTP.
pub struct HttpBackend {
    tier: Tier,
    url: String,
    service_key: String,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(
        tier: Tier,
        url: &str,
        service_key: &str,
        timeout: Duration,
    ) -> Result<Self, RouterError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RouterError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            tier,
            url: url.to_string(),
            service_key: service_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl TierBackend for HttpBackend {
    async fn process(&self, payload: &JobPayload) -> Result<serde_json::Value, BackendFailure> {
        let mut request = self.client.post(&self.url).json(&payload.body_for(self.tier));
        if !self.service_key.is_empty() {
            request = request
                .header("apikey", &self.service_key)
                .bearer_auth(&self.service_key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| BackendFailure::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(BackendFailure {
                status: Some(status.as_u16()),
                message: if body.is_empty() {
                    status.to_string()
                } else {
                    body
                },
            });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| BackendFailure {
                status: Some(status.as_u16()),
                message: format!("invalid response body: {}", e),
            })
    }
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

/// In-process backend that accepts every job. Used in mock mode.
#[derive(Debug, Clone, Copy)]
pub struct EchoBackend {
    pub tier: Tier,
}

#[async_trait]
impl TierBackend for EchoBackend {
    async fn process(&self, payload: &JobPayload) -> Result<serde_json::Value, BackendFailure> {
        Ok(serde_json::json!({
            "success": true,
            "mock": true,
            "tier": self.tier,
            "request": payload.body_for(self.tier),
        }))
    }
}

//! Router configuration
//!
//! Defaults come from `ORBIT_*` environment variables; a TOML file may
//! override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {}", .0.join(", "))]
    Invalid(Vec<String>),
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Endpoints, timeouts and limits for the tiered router.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Tier 1 batch-processing endpoint
    pub fast_backend_url: String,
    /// Tier 2 orchestration endpoint
    pub comprehensive_backend_url: String,
    /// Item analysis service (probed only)
    pub analysis_service_url: String,
    /// REST root of the durable job store
    pub store_url: String,
    /// Root of the blob storage API
    pub blob_url: String,
    /// Bucket listed when probing blob access
    pub blob_bucket: String,
    /// Service key sent as `apikey` and bearer token
    pub service_key: String,
    /// Per-check probe timeout
    pub probe_timeout_ms: u64,
    /// Per-attempt dispatch timeout
    pub dispatch_timeout_ms: u64,
    /// Trailing window for performance metrics
    pub metrics_window_secs: u64,
    /// Dispatch capacity used to derive system load
    pub max_concurrent_jobs: u32,
    /// Use in-process stores and backends instead of the network
    pub mock_mode: bool,
    /// Address the HTTP service binds to
    pub listen_addr: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            fast_backend_url: env_or(
                "ORBIT_FAST_BACKEND_URL",
                "http://127.0.0.1:54321/functions/v1/process-image-batch",
            ),
            comprehensive_backend_url: env_or(
                "ORBIT_COMPREHENSIVE_BACKEND_URL",
                "http://127.0.0.1:54321/functions/v1/orbit-orchestrate",
            ),
            analysis_service_url: env_or(
                "ORBIT_ANALYSIS_URL",
                "http://127.0.0.1:54321/functions/v1/analyze-image",
            ),
            store_url: env_or("ORBIT_STORE_URL", "http://127.0.0.1:54321/rest/v1"),
            blob_url: env_or("ORBIT_BLOB_URL", "http://127.0.0.1:54321/storage/v1"),
            blob_bucket: env_or("ORBIT_BLOB_BUCKET", "orbit-images"),
            service_key: env_or("ORBIT_SERVICE_KEY", ""),
            probe_timeout_ms: env_parse("ORBIT_PROBE_TIMEOUT_MS", 5_000),
            dispatch_timeout_ms: env_parse("ORBIT_DISPATCH_TIMEOUT_MS", 120_000),
            metrics_window_secs: env_parse("ORBIT_METRICS_WINDOW_SECS", 300),
            max_concurrent_jobs: env_parse("ORBIT_MAX_CONCURRENT_JOBS", 16),
            mock_mode: env_parse("ORBIT_MOCK_MODE", false),
            listen_addr: env_or("ORBIT_LISTEN_ADDR", "127.0.0.1:8787"),
        }
    }
}

impl RouterConfig {
    /// Load from environment only.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Load a TOML file; fields it omits fall back to the environment defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "Loaded router config");
        Ok(config)
    }

    /// List every problem with this configuration.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.mock_mode && self.service_key.is_empty() {
            errors.push("ORBIT_SERVICE_KEY is required unless mock mode is enabled".to_string());
        }

        for (name, url) in [
            ("fast_backend_url", &self.fast_backend_url),
            ("comprehensive_backend_url", &self.comprehensive_backend_url),
            ("analysis_service_url", &self.analysis_service_url),
            ("store_url", &self.store_url),
            ("blob_url", &self.blob_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{} must be an http(s) URL, got '{}'", name, url));
            }
        }

        if self.probe_timeout_ms == 0 {
            errors.push("probe_timeout_ms must be greater than zero".to_string());
        }
        if self.dispatch_timeout_ms == 0 {
            errors.push("dispatch_timeout_ms must be greater than zero".to_string());
        }
        if self.metrics_window_secs == 0 {
            errors.push("metrics_window_secs must be greater than zero".to_string());
        }
        if self.max_concurrent_jobs == 0 {
            errors.push("max_concurrent_jobs must be greater than zero".to_string());
        }
        if self.blob_bucket.is_empty() {
            errors.push("blob_bucket must not be empty".to_string());
        }

        errors
    }

    /// Consume the config, failing if [`validate`](Self::validate) reports anything.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn metrics_window(&self) -> Duration {
        Duration::from_secs(self.metrics_window_secs)
    }
}

//! Health Prober: concurrent liveness checks with per-check timeouts.
//!
//! Each backend gets a synthetic `POST` that it is expected to reject. A 2xx
//! or a `400 Bad Request` proves the function is deployed and routing; any
//! transport error, timeout, 5xx, or other status marks it unavailable.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{HealthReport, SystemHealth};
use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::store::{BlobStore, JobStore};

/// Where and how long to probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub fast_url: String,
    pub comprehensive_url: String,
    pub analysis_url: String,
    /// Sent as `apikey` and bearer token; empty sends neither
    pub service_key: String,
    /// Upper bound for any single check
    pub timeout: Duration,
    /// Report backends and analysis service as up without probing them
    pub mock_backends: bool,
}

impl ProbeConfig {
    pub fn from_router_config(config: &RouterConfig) -> Self {
        Self {
            fast_url: config.fast_backend_url.clone(),
            comprehensive_url: config.comprehensive_backend_url.clone(),
            analysis_url: config.analysis_service_url.clone(),
            service_key: config.service_key.clone(),
            timeout: config.probe_timeout(),
            mock_backends: config.mock_mode,
        }
    }
}

/// Result of one capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Available,
    Unavailable(String),
    TimedOut,
}

impl ProbeOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }

    fn failure(&self, capability: &str) -> Option<String> {
        match self {
            Self::Available => None,
            Self::Unavailable(reason) => Some(reason.clone()),
            Self::TimedOut => Some(RouterError::ProbeTimeout(capability.to_string()).to_string()),
        }
    }
}

/// Probe outcome counters
#[derive(Debug, Default)]
pub struct ProbeCounters {
    available: AtomicU64,
    unavailable: AtomicU64,
    timeouts: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeCountersSnapshot {
    pub available: u64,
    pub unavailable: u64,
    pub timeouts: u64,
}

impl ProbeCounters {
    fn record(&self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Available => self.available.fetch_add(1, Ordering::Relaxed),
            ProbeOutcome::Unavailable(_) => self.unavailable.fetch_add(1, Ordering::Relaxed),
            ProbeOutcome::TimedOut => self.timeouts.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn snapshot(&self) -> ProbeCountersSnapshot {
        ProbeCountersSnapshot {
            available: self.available.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Probes both backends, the analysis service, the job store and the blob store.
#[derive(Clone)]
pub struct HealthProber {
    config: ProbeConfig,
    http: reqwest::Client,
    store: Arc<dyn JobStore>,
    blob: Arc<dyn BlobStore>,
    counters: Arc<ProbeCounters>,
}

impl HealthProber {
    pub fn new(
        config: ProbeConfig,
        store: Arc<dyn JobStore>,
        blob: Arc<dyn BlobStore>,
    ) -> Result<Self, RouterError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| RouterError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            store,
            blob,
            counters: Arc::new(ProbeCounters::default()),
        })
    }

    pub fn counters(&self) -> ProbeCountersSnapshot {
        self.counters.snapshot()
    }

    /// Run every check concurrently and assemble a report.
    ///
    /// Total latency is bounded by the slowest single check; no check can
    /// cancel or fail another.
    pub async fn probe(&self) -> HealthReport {
        let start = Instant::now();

        let (fast, comprehensive, analysis, store, blob) = tokio::join!(
            self.probe_backend(&self.config.fast_url),
            self.probe_backend(&self.config.comprehensive_url),
            self.probe_backend(&self.config.analysis_url),
            self.bounded(async { self.store.ping().await.map_err(|e| e.to_string()) }),
            self.bounded(async { self.blob.ping().await.map_err(|e| e.to_string()) }),
        );

        let mut details = BTreeMap::new();
        for (name, outcome) in [
            ("fast_backend", &fast),
            ("comprehensive_backend", &comprehensive),
            ("analysis_service", &analysis),
            ("store", &store),
            ("blob", &blob),
        ] {
            self.counters.record(outcome);
            if let Some(reason) = outcome.failure(name) {
                warn!(capability = name, "Health probe failed: {}", reason);
                details.insert(name.to_string(), reason);
            }
        }

        let health = SystemHealth {
            fast_available: fast.is_available(),
            comprehensive_available: comprehensive.is_available(),
            store_responsive: store.is_available(),
            blob_accessible: blob.is_available(),
            analysis_service_online: analysis.is_available(),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        debug!(overall = %health.overall(), elapsed_ms, "Health probe complete");

        HealthReport {
            overall: health.overall(),
            health,
            details,
            elapsed_ms,
        }
    }

    /// Synthetic request against a backend endpoint.
    async fn probe_backend(&self, url: &str) -> ProbeOutcome {
        if self.config.mock_backends {
            return ProbeOutcome::Available;
        }
        self.bounded(async {
            let mut request = self.http.post(url).json(&serde_json::json!({ "probe": true }));
            if !self.config.service_key.is_empty() {
                request = request
                    .header("apikey", &self.config.service_key)
                    .bearer_auth(&self.config.service_key);
            }
            let resp = request.send().await.map_err(|e| e.to_string())?;
            let status = resp.status();
            if status.is_success() || status == reqwest::StatusCode::BAD_REQUEST {
                // Drain the body so a server that hangs mid-response counts as down.
                let _body = resp.bytes().await.map_err(|e| e.to_string())?;
                Ok(())
            } else {
                Err(format!("non-success status {}", status))
            }
        })
        .await
    }

    async fn bounded<F>(&self, check: F) -> ProbeOutcome
    where
        F: std::future::Future<Output = Result<(), String>>,
    {
        match tokio::time::timeout(self.config.timeout, check).await {
            Ok(Ok(())) => ProbeOutcome::Available,
            Ok(Err(e)) => ProbeOutcome::Unavailable(e),
            Err(_) => ProbeOutcome::TimedOut,
        }
    }
}

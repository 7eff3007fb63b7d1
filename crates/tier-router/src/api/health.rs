//! GET /health

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use routing::health::ProbeCountersSnapshot;
use routing::{HealthReport, OverallStatus};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: OverallStatus,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub report: HealthReport,
    /// Probe outcome counters since startup
    pub probes: ProbeCountersSnapshot,
}

/// GET /health
///
/// Runs a fresh probe round. Answers 503 only when every capability is down.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.router.prober().probe().await;
    let uptime = Utc::now().signed_duration_since(state.started_at);

    let status = if report.overall == OverallStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(HealthResponse {
            status: report.overall,
            module: "tier-router".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
            report,
            probes: state.router.prober().counters(),
        }),
    )
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

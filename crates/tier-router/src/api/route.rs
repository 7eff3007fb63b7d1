//! POST /route

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use routing::{RouteOutcome, RouteRequest};
use tracing::info;

use super::ApiError;
use crate::AppState;

/// POST /route
///
/// Routes and executes one job. The response carries the decision, every
/// snapshot it was based on, and the backend's result.
pub async fn route_job(
    State(state): State<AppState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<RouteOutcome>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.job_id.trim().is_empty() {
        return Err(ApiError::BadRequest("jobId must not be empty".to_string()));
    }

    let outcome = state.router.route(&request).await?;
    info!(
        route_id = %outcome.route_id,
        job_id = %outcome.job_id,
        served = %outcome.served_tier,
        actual_ms = outcome.actual_duration_ms,
        estimated_ms = outcome.estimated_duration_ms,
        "Route complete"
    );
    Ok(Json(outcome))
}

pub fn route_routes() -> Router<AppState> {
    Router::new().route("/route", post(route_job))
}

//! Read-only views of escalation state

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use routing::EscalationTrigger;

use crate::AppState;

/// GET /escalation/cooldowns
///
/// Trigger name → when it last fired.
pub async fn list_cooldowns(
    State(state): State<AppState>,
) -> Json<BTreeMap<String, DateTime<Utc>>> {
    Json(state.router.engine().cooldowns().snapshot())
}

/// GET /escalation/triggers
pub async fn list_triggers(State(state): State<AppState>) -> Json<Vec<EscalationTrigger>> {
    Json(state.router.engine().triggers().to_vec())
}

pub fn escalation_routes() -> Router<AppState> {
    Router::new()
        .route("/escalation/cooldowns", get(list_cooldowns))
        .route("/escalation/triggers", get(list_triggers))
}

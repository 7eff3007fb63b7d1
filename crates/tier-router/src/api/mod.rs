//! HTTP API handlers

pub mod error;
pub mod escalation;
pub mod health;
pub mod route;

pub use error::ApiError;
pub use escalation::{escalation_routes, list_cooldowns, list_triggers};
pub use health::{health_check, health_routes, HealthResponse};
pub use route::{route_job, route_routes};

//! API error type and its JSON rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use routing::{RouteFailure, RouterError};
use serde_json::json;
use thiserror::Error;

/// Errors returned by API handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or incomplete request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// The routing pipeline failed; carries its partial trace
    #[error(transparent)]
    Route(#[from] RouteFailure),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Route(failure) => match failure.error {
                RouterError::NotFound(_) => StatusCode::NOT_FOUND,
                RouterError::AllTiersUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                RouterError::BackendDispatch { .. } | RouterError::FallbackExhausted { .. } => {
                    StatusCode::BAD_GATEWAY
                }
                RouterError::ProbeTimeout(_) | RouterError::Store(_) | RouterError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Route(failure) => failure.code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let (message, trace) = match self {
            ApiError::BadRequest(msg) => (format!("Invalid request: {}", msg), None),
            ApiError::Route(failure) => (failure.error.to_string(), Some(failure.trace)),
        };

        let body = Json(json!({
            "error": message,
            "code": code,
            "timestamp": Utc::now().to_rfc3339(),
            "trace": trace,
        }));

        (status, body).into_response()
    }
}

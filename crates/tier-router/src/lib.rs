//! tier-router library - HTTP boundary of the tiered job router
//!
//! Exposes routing over HTTP, the health report, and read-only views of the
//! escalation state.

use std::path::Path;

use axum::Router;
use chrono::{DateTime, Utc};
use routing::{ConfigError, RouterConfig, TieredRouter};

pub mod api;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub router: TieredRouter,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(router: TieredRouter) -> Self {
        Self {
            router,
            started_at: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::route_routes())
        .merge(api::health_routes())
        .merge(api::escalation_routes())
        .with_state(state)
}

/// Resolve configuration: TOML file if given (environment otherwise), then
/// the listen override, then validation.
pub fn load_config(
    path: Option<&Path>,
    listen_override: Option<&str>,
) -> Result<RouterConfig, ConfigError> {
    let mut config = match path {
        Some(path) => RouterConfig::from_file(path)?,
        None => RouterConfig::from_env(),
    };
    if let Some(listen) = listen_override {
        config.listen_addr = listen.to_string();
    }
    config.validated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config_file_and_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mock_mode = true").unwrap();
        writeln!(file, "listen_addr = \"127.0.0.1:9000\"").unwrap();

        let config = load_config(Some(file.path()), Some("0.0.0.0:8080")).unwrap();
        assert!(config.mock_mode);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mock_mode = true").unwrap();
        writeln!(file, "probe_timeout_ms = 0").unwrap();

        let err = load_config(Some(file.path()), None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}

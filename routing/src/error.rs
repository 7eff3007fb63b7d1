//! Error taxonomy for the routing pipeline.

use crate::dispatch::DispatchAttempt;
use crate::pipeline::RouteTrace;
use crate::tier::Tier;

/// Failures raised by the job/blob store collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors produced by the router.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RouterError {
    /// The job does not exist or has no work items.
    #[error("Job not found or has no work items: {0}")]
    NotFound(String),

    /// Neither backend answered its health probe.
    #[error("All processing tiers are unavailable")]
    AllTiersUnavailable,

    /// A single dispatch attempt against one backend failed.
    #[error("Dispatch to {tier} tier failed: {message}")]
    BackendDispatch { tier: Tier, message: String },

    /// The primary attempt and its fallback both failed (or there was no fallback).
    #[error("Dispatch failed after {} attempt(s): {}", .attempts.len(), summarize(.attempts))]
    FallbackExhausted { attempts: Vec<DispatchAttempt> },

    /// A probe exceeded its timeout. Only ever folded into an unavailable capability.
    #[error("Probe of {0} timed out")]
    ProbeTimeout(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RouterError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "JOB_NOT_FOUND",
            Self::AllTiersUnavailable => "ALL_TIERS_UNAVAILABLE",
            Self::BackendDispatch { .. } => "BACKEND_DISPATCH_FAILED",
            Self::FallbackExhausted { .. } => "FALLBACK_EXHAUSTED",
            Self::ProbeTimeout(_) => "PROBE_TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether an operator has to step in before the job can make progress.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AllTiersUnavailable | Self::Config(_))
    }
}

fn summarize(attempts: &[DispatchAttempt]) -> String {
    attempts
        .iter()
        .map(|a| {
            format!(
                "{}: {}",
                a.tier,
                a.error.as_deref().unwrap_or("succeeded")
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// A routing failure together with everything the pipeline learned before it failed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error}")]
pub struct RouteFailure {
    pub error: RouterError,
    pub trace: Box<RouteTrace>,
}

impl RouteFailure {
    pub fn new(error: RouterError, trace: RouteTrace) -> Self {
        Self {
            error,
            trace: Box::new(trace),
        }
    }

    pub fn code(&self) -> &'static str {
        self.error.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::DispatchOutcome;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            RouterError::NotFound("j".into()),
            RouterError::AllTiersUnavailable,
            RouterError::BackendDispatch {
                tier: Tier::Fast,
                message: "boom".into(),
            },
            RouterError::FallbackExhausted { attempts: vec![] },
            RouterError::ProbeTimeout("store".into()),
            RouterError::Store(StoreError::Parse("bad".into())),
            RouterError::Config("bad".into()),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_fallback_exhausted_lists_every_attempt() {
        let err = RouterError::FallbackExhausted {
            attempts: vec![
                DispatchAttempt {
                    tier: Tier::Comprehensive,
                    outcome: DispatchOutcome::Failed,
                    status: Some(500),
                    error: Some("HTTP 500".into()),
                    elapsed_ms: 12,
                    reason: "primary".into(),
                },
                DispatchAttempt {
                    tier: Tier::Fast,
                    outcome: DispatchOutcome::Failed,
                    status: None,
                    error: Some("connection refused".into()),
                    elapsed_ms: 3,
                    reason: "fallback".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("2 attempt(s)"));
        assert!(msg.contains("comprehensive: HTTP 500"));
        assert!(msg.contains("fast: connection refused"));
        assert!(!err.is_fatal());
        assert!(RouterError::AllTiersUnavailable.is_fatal());
    }
}

//! Execution Dispatcher
//!
//! Sends a job to the tier chosen by the decision engine and, on failure,
//! once to the decision's fallback tier. Retries beyond that belong to the
//! caller.

pub mod backend;
pub mod dispatcher;

use serde::{Deserialize, Serialize};

use crate::router::RoutingDecision;
use crate::tier::{AnalysisKind, JobAction, Tier};

pub use backend::{BackendFailure, EchoBackend, HttpBackend, TierBackend};
pub use dispatcher::Dispatcher;

/// What gets sent to a backend. Each tier receives its own wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPayload {
    pub job_id: String,
    pub action: JobAction,
    pub analysis_kind: AnalysisKind,
    /// Why the comprehensive tier is handling this job, if it was forced there
    pub escalation_reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FastRequest<'a> {
    job_id: &'a str,
    analysis_kind: AnalysisKind,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComprehensiveRequest<'a> {
    job_id: &'a str,
    action: JobAction,
    analysis_kind: AnalysisKind,
    escalation_reason: Option<&'a str>,
}

impl JobPayload {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            action: JobAction::default(),
            analysis_kind: AnalysisKind::default(),
            escalation_reason: None,
        }
    }

    /// Request body for `tier`.
    pub fn body_for(&self, tier: Tier) -> serde_json::Value {
        let body = match tier {
            Tier::Fast => serde_json::to_value(FastRequest {
                job_id: &self.job_id,
                analysis_kind: self.analysis_kind,
            }),
            Tier::Comprehensive => serde_json::to_value(ComprehensiveRequest {
                job_id: &self.job_id,
                action: self.action,
                analysis_kind: self.analysis_kind,
                escalation_reason: self.escalation_reason.as_deref(),
            }),
        };
        // Plain structs of strings and unit enums always serialize.
        body.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Succeeded,
    Failed,
}

/// One call to one backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchAttempt {
    pub tier: Tier,
    pub outcome: DispatchOutcome,
    /// HTTP status, when a response arrived
    pub status: Option<u16>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
    /// `primary` or `fallback: <cause>`
    pub reason: String,
}

/// A successfully dispatched job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The tier that actually produced `result`
    pub served_tier: Tier,
    pub result: serde_json::Value,
    /// Decision as executed; its reason notes any fallback
    pub decision: RoutingDecision,
    pub attempts: Vec<DispatchAttempt>,
    pub elapsed_ms: u64,
}

impl ExecutionResult {
    pub fn used_fallback(&self) -> bool {
        self.served_tier != self.decision.selected_tier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_body_shape() {
        let mut payload = JobPayload::new("job-1");
        payload.escalation_reason = Some("ignored".into());
        let body = payload.body_for(Tier::Fast);
        assert_eq!(
            body,
            serde_json::json!({ "jobId": "job-1", "analysisKind": "lifestyle" })
        );
    }

    #[test]
    fn test_comprehensive_body_shape() {
        let payload = JobPayload {
            job_id: "job-2".into(),
            action: JobAction::Recover,
            analysis_kind: AnalysisKind::Product,
            escalation_reason: Some("repeated_failures".into()),
        };
        let body = payload.body_for(Tier::Comprehensive);
        assert_eq!(
            body,
            serde_json::json!({
                "jobId": "job-2",
                "action": "recover",
                "analysisKind": "product",
                "escalationReason": "repeated_failures",
            })
        );
    }

    #[test]
    fn test_comprehensive_body_without_reason() {
        let body = JobPayload::new("job-3").body_for(Tier::Comprehensive);
        assert!(body["escalationReason"].is_null());
        assert_eq!(body["action"], "process");
    }
}

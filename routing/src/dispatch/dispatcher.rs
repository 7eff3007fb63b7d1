//! Primary-then-fallback execution.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::backend::{BackendFailure, TierBackend};
use super::{DispatchAttempt, DispatchOutcome, ExecutionResult, JobPayload};
use crate::error::RouterError;
use crate::metrics::MetricsProvider;
use crate::router::RoutingDecision;
use crate::tier::Tier;

/// Executes routing decisions against the tier backends.
#[derive(Clone)]
pub struct Dispatcher {
    backends: HashMap<Tier, Arc<dyn TierBackend>>,
    metrics: Arc<dyn MetricsProvider>,
}

impl Dispatcher {
    pub fn new(
        fast: Arc<dyn TierBackend>,
        comprehensive: Arc<dyn TierBackend>,
        metrics: Arc<dyn MetricsProvider>,
    ) -> Self {
        let mut backends: HashMap<Tier, Arc<dyn TierBackend>> = HashMap::new();
        backends.insert(Tier::Fast, fast);
        backends.insert(Tier::Comprehensive, comprehensive);
        Self { backends, metrics }
    }

    /// Run `decision` for `payload`.
    ///
    /// The selected tier is tried first. If it fails and the decision names a
    /// different fallback tier, that tier is tried exactly once. Any surfaced
    /// failure is [`RouterError::FallbackExhausted`] listing every attempt.
    pub async fn execute(
        &self,
        decision: &RoutingDecision,
        payload: &JobPayload,
    ) -> Result<ExecutionResult, RouterError> {
        let start = Instant::now();
        let _in_flight = self.metrics.track_in_flight();
        let mut decision = decision.clone();
        let mut attempts = Vec::with_capacity(2);

        let primary = decision.selected_tier;
        let primary_result = self
            .attempt(primary, payload, "primary".to_string(), &mut attempts)
            .await;
        let failure = match primary_result {
            Ok(result) => return Ok(self.finish(primary, result, decision, attempts, start)),
            Err(failure) => failure,
        };

        let fallback = match decision.fallback_tier {
            Some(tier) if tier != primary => tier,
            _ => {
                warn!(
                    job_id = %payload.job_id,
                    tier = %primary,
                    "Dispatch failed with no fallback available"
                );
                return Err(RouterError::FallbackExhausted { attempts });
            }
        };

        let cause = RouterError::BackendDispatch {
            tier: primary,
            message: failure.to_string(),
        }
        .to_string();
        info!(
            job_id = %payload.job_id,
            from = %primary,
            to = %fallback,
            "Falling back after dispatch failure: {}",
            cause
        );
        decision.reason = format!(
            "{}; fell back to {} tier ({})",
            decision.reason, fallback, cause
        );

        let mut fallback_payload = payload.clone();
        if fallback == Tier::Comprehensive && fallback_payload.escalation_reason.is_none() {
            fallback_payload.escalation_reason = Some(format!("fallback: {}", cause));
        }

        let fallback_result = self
            .attempt(
                fallback,
                &fallback_payload,
                format!("fallback: {}", cause),
                &mut attempts,
            )
            .await;
        match fallback_result {
            Ok(result) => Ok(self.finish(fallback, result, decision, attempts, start)),
            Err(_) => {
                warn!(
                    job_id = %payload.job_id,
                    attempts = attempts.len(),
                    "Primary and fallback dispatch both failed"
                );
                Err(RouterError::FallbackExhausted { attempts })
            }
        }
    }

    async fn attempt(
        &self,
        tier: Tier,
        payload: &JobPayload,
        reason: String,
        attempts: &mut Vec<DispatchAttempt>,
    ) -> Result<serde_json::Value, BackendFailure> {
        let start = Instant::now();
        info!(job_id = %payload.job_id, tier = %tier, "Dispatching job");

        let result = match self.backends.get(&tier) {
            Some(backend) => backend.process(payload).await,
            None => Err(BackendFailure::transport(format!(
                "no backend configured for {} tier",
                tier
            ))),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_attempt(tier, result.is_ok(), elapsed_ms);

        let (outcome, status, error) = match &result {
            Ok(_) => (DispatchOutcome::Succeeded, None, None),
            Err(failure) => {
                warn!(
                    job_id = %payload.job_id,
                    tier = %tier,
                    elapsed_ms,
                    "Dispatch attempt failed: {}",
                    failure
                );
                (
                    DispatchOutcome::Failed,
                    failure.status,
                    Some(failure.to_string()),
                )
            }
        };
        attempts.push(DispatchAttempt {
            tier,
            outcome,
            status,
            error,
            elapsed_ms,
            reason,
        });
        result
    }

    fn finish(
        &self,
        served_tier: Tier,
        result: serde_json::Value,
        decision: RoutingDecision,
        attempts: Vec<DispatchAttempt>,
        start: Instant,
    ) -> ExecutionResult {
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            tier = %served_tier,
            elapsed_ms,
            estimated_ms = decision.estimated_duration_ms,
            "Job dispatched"
        );
        ExecutionResult {
            served_tier,
            result,
            decision,
            attempts,
            elapsed_ms,
        }
    }
}

//! TieredRouter: runs one routing call end to end.
//!
//! Probe and analysis run concurrently; metrics, escalation, decision and
//! dispatch follow in order. Every stage is written into a [`RouteTrace`],
//! which travels with the outcome or with the failure.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::complexity::{ComplexityAnalyzer, OrderComplexity};
use crate::config::RouterConfig;
use crate::dispatch::{
    DispatchAttempt, Dispatcher, EchoBackend, ExecutionResult, HttpBackend, JobPayload,
    TierBackend,
};
use crate::error::{RouteFailure, RouterError};
use crate::escalation::{
    CooldownStore, ErrorCategory, EscalationContext, EscalationEngine, EscalationResult,
};
use crate::health::{HealthProber, HealthReport, ProbeConfig};
use crate::metrics::{MetricsProvider, PerformanceMetrics, RollingMetrics};
use crate::router::{decide, RoutingDecision};
use crate::store::{
    BlobStore, JobStore, RestBlobStore, RestJobStore, StaticBlobStore, SyntheticJobStore,
};
use crate::tier::{AnalysisKind, JobAction, JobPriority, RiskLevel, Tier};

fn first_attempt() -> u32 {
    1
}

/// An inbound routing request, with optional escalation hints from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub job_id: String,
    #[serde(default)]
    pub action: JobAction,
    #[serde(default)]
    pub analysis_kind: AnalysisKind,
    #[serde(default)]
    pub priority: JobPriority,
    /// Force a tier
    #[serde(default, rename = "override", alias = "tierOverride")]
    pub tier_override: Option<Tier>,
    /// Which attempt this is, starting at 1
    #[serde(default = "first_attempt")]
    pub attempt: u32,
    #[serde(default)]
    pub tier1_failures: u32,
    /// Failed attempts on any tier so far
    #[serde(default)]
    pub failures: u32,
    /// Time already spent on the job before this call
    #[serde(default)]
    pub elapsed_ms: u64,
    /// Error messages from earlier attempts
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub is_retry: bool,
}

impl RouteRequest {
    pub fn new(job_id: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            action: JobAction::default(),
            analysis_kind: AnalysisKind::default(),
            priority: JobPriority::default(),
            tier_override: None,
            attempt: first_attempt(),
            tier1_failures: 0,
            failures: 0,
            elapsed_ms: 0,
            errors: Vec::new(),
            is_retry: false,
        }
    }
}

/// Everything one routing call observed and decided.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTrace {
    pub route_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub health: Option<HealthReport>,
    pub complexity: Option<OrderComplexity>,
    pub metrics: Option<PerformanceMetrics>,
    pub escalation: Option<EscalationResult>,
    pub decision: Option<RoutingDecision>,
    pub attempts: Vec<DispatchAttempt>,
}

impl RouteTrace {
    pub fn new() -> Self {
        Self {
            route_id: Uuid::new_v4(),
            started_at: Utc::now(),
            ..Default::default()
        }
    }
}

/// A routed and executed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteOutcome {
    pub route_id: Uuid,
    pub job_id: String,
    /// Tier the decision engine chose
    pub selected_tier: Tier,
    /// Tier that actually served the job
    pub served_tier: Tier,
    pub reason: String,
    pub confidence: f64,
    pub risk_level: RiskLevel,
    pub estimated_duration_ms: u64,
    pub actual_duration_ms: u64,
    pub trace: RouteTrace,
    pub execution: ExecutionResult,
}

/// The routing pipeline. Cheap to clone; clones share cooldowns and metrics.
#[derive(Clone)]
pub struct TieredRouter {
    prober: HealthProber,
    analyzer: ComplexityAnalyzer,
    metrics: Arc<dyn MetricsProvider>,
    engine: EscalationEngine,
    dispatcher: Dispatcher,
}

impl TieredRouter {
    pub fn new(
        prober: HealthProber,
        analyzer: ComplexityAnalyzer,
        metrics: Arc<dyn MetricsProvider>,
        engine: EscalationEngine,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            prober,
            analyzer,
            metrics,
            engine,
            dispatcher,
        }
    }

    /// Wire the production collaborators, or in-process stand-ins in mock mode.
    pub fn from_config(config: &RouterConfig) -> Result<Self, RouterError> {
        let metrics: Arc<RollingMetrics> = Arc::new(RollingMetrics::new(
            config.metrics_window(),
            config.max_concurrent_jobs,
        ));

        let (store, blob, fast, comprehensive): (
            Arc<dyn JobStore>,
            Arc<dyn BlobStore>,
            Arc<dyn TierBackend>,
            Arc<dyn TierBackend>,
        ) = if config.mock_mode {
            info!("Mock mode: using in-process store and backends");
            (
                Arc::new(SyntheticJobStore::default()),
                Arc::new(StaticBlobStore { accessible: true }),
                Arc::new(EchoBackend { tier: Tier::Fast }),
                Arc::new(EchoBackend {
                    tier: Tier::Comprehensive,
                }),
            )
        } else {
            let timeout = config.probe_timeout();
            (
                Arc::new(RestJobStore::new(
                    &config.store_url,
                    &config.service_key,
                    timeout,
                )?),
                Arc::new(RestBlobStore::new(
                    &config.blob_url,
                    &config.blob_bucket,
                    &config.service_key,
                    timeout,
                )?),
                Arc::new(HttpBackend::new(
                    Tier::Fast,
                    &config.fast_backend_url,
                    &config.service_key,
                    config.dispatch_timeout(),
                )?),
                Arc::new(HttpBackend::new(
                    Tier::Comprehensive,
                    &config.comprehensive_backend_url,
                    &config.service_key,
                    config.dispatch_timeout(),
                )?),
            )
        };

        let prober = HealthProber::new(
            ProbeConfig::from_router_config(config),
            store.clone(),
            blob,
        )?;
        let dispatcher = Dispatcher::new(fast, comprehensive, metrics.clone());

        Ok(Self::new(
            prober,
            ComplexityAnalyzer::new(store),
            metrics,
            EscalationEngine::new(CooldownStore::new()),
            dispatcher,
        ))
    }

    pub fn prober(&self) -> &HealthProber {
        &self.prober
    }

    pub fn engine(&self) -> &EscalationEngine {
        &self.engine
    }

    /// Route and execute one job.
    ///
    /// Cooldown stamps made while evaluating escalation are committed once
    /// the call finishes, whether it succeeds or fails. Dropping the returned
    /// future before then leaves the cooldown table untouched.
    pub async fn route(&self, request: &RouteRequest) -> Result<RouteOutcome, RouteFailure> {
        let start = Instant::now();
        let mut trace = RouteTrace::new();
        let job_id = request.job_id.as_str();
        info!(route_id = %trace.route_id, job_id = %job_id, "Routing job");

        let (report, complexity) =
            tokio::join!(self.prober.probe(), self.analyzer.analyze(job_id));
        let health = report.health;
        trace.health = Some(report);
        let complexity = match complexity {
            Ok(c) => c,
            Err(e) => return Err(fail(e, trace)),
        };
        trace.complexity = Some(complexity.clone());

        let metrics = self.metrics.snapshot().await;
        trace.metrics = Some(metrics);

        let context = escalation_context(request, &complexity, &metrics, start.elapsed());
        let pending = self.engine.begin(&context, Utc::now());
        trace.escalation = Some(pending.result().clone());

        let decided = decide(
            &health,
            &complexity,
            &metrics,
            pending.result(),
            request.priority,
            request.tier_override,
        );
        let decision = match decided {
            Ok(d) => d,
            Err(e) => {
                pending.commit();
                return Err(fail(e, trace));
            }
        };
        info!(
            job_id = %job_id,
            tier = %decision.selected_tier,
            confidence = decision.confidence,
            score = ?decision.score,
            risk = %decision.risk_level,
            "Routing decision: {}",
            decision.reason
        );
        trace.decision = Some(decision.clone());

        let payload = JobPayload {
            job_id: request.job_id.clone(),
            action: request.action,
            analysis_kind: request.analysis_kind,
            escalation_reason: pending.result().escalation_reason(),
        };
        let executed = self.dispatcher.execute(&decision, &payload).await;
        pending.commit();

        match executed {
            Ok(execution) => {
                trace.attempts = execution.attempts.clone();
                Ok(RouteOutcome {
                    route_id: trace.route_id,
                    job_id: request.job_id.clone(),
                    selected_tier: decision.selected_tier,
                    served_tier: execution.served_tier,
                    reason: execution.decision.reason.clone(),
                    confidence: decision.confidence,
                    risk_level: decision.risk_level,
                    estimated_duration_ms: decision.estimated_duration_ms,
                    actual_duration_ms: start.elapsed().as_millis() as u64,
                    trace,
                    execution,
                })
            }
            Err(e) => {
                if let RouterError::FallbackExhausted { attempts } = &e {
                    trace.attempts = attempts.clone();
                }
                Err(fail(e, trace))
            }
        }
    }
}

fn fail(error: RouterError, trace: RouteTrace) -> RouteFailure {
    if error.is_fatal() {
        error!(route_id = %trace.route_id, code = error.code(), "Routing failed: {}", error);
    } else {
        warn!(route_id = %trace.route_id, code = error.code(), "Routing failed: {}", error);
    }
    RouteFailure::new(error, trace)
}

/// Merge caller hints with what the router observed.
fn escalation_context(
    request: &RouteRequest,
    complexity: &OrderComplexity,
    metrics: &PerformanceMetrics,
    spent: Duration,
) -> EscalationContext {
    let messages: Vec<&str> = request
        .errors
        .iter()
        .chain(complexity.recorded_errors.iter())
        .map(String::as_str)
        .collect();

    EscalationContext {
        attempt_count: request.attempt,
        tier1_failures: request.tier1_failures,
        failure_count: request.failures.max(request.tier1_failures),
        elapsed_ms: request.elapsed_ms + spent.as_millis() as u64,
        error_categories: ErrorCategory::classify_all(&messages),
        system_load: metrics.system_load,
        is_retry: request.is_retry,
        requester_tier: complexity.requester_tier,
    }
}

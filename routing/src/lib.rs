//! Tiered Job Router
//!
//! Decides, per incoming job, which of two processing backends should serve it
//! and then dispatches the job with a single fallback attempt.
//!
//! # Pipeline
//!
//! ```text
//! RouteRequest
//!   ├─ HealthProber ──────────┐  (concurrent)
//!   ├─ ComplexityAnalyzer ────┤
//!   │                         ▼
//!   ├─ MetricsProvider ──► EscalationEngine (cooldown store)
//!   │                         │
//!   │                         ▼
//!   │                  decide(): pure routing decision
//!   │                         │
//!   └───────────────────► Dispatcher: primary, then one fallback
//! ```
//!
//! Every stage writes into a [`RouteTrace`] that is returned with the outcome,
//! including on failure.

#![allow(clippy::uninlined_format_args)]

pub mod complexity;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod escalation;
pub mod health;
pub mod metrics;
pub mod pipeline;
pub mod router;
pub mod store;
pub mod tier;

pub use complexity::{
    ComplexityAnalyzer, ItemStatus, JobMetadata, OrderComplexity, RequesterTier, WorkItem,
};
pub use config::{ConfigError, RouterConfig};
pub use dispatch::{
    BackendFailure, DispatchAttempt, DispatchOutcome, Dispatcher, EchoBackend, ExecutionResult,
    HttpBackend, JobPayload, TierBackend,
};
pub use error::{RouteFailure, RouterError, StoreError};
pub use escalation::{
    CooldownStore, ErrorCategory, EscalationContext, EscalationEngine, EscalationResult,
    EscalationTrigger, TriggerAction, TriggerSeverity, DEFAULT_TRIGGERS,
};
pub use health::{HealthProber, HealthReport, OverallStatus, ProbeConfig, SystemHealth};
pub use metrics::{MetricsProvider, PerformanceMetrics, RollingMetrics, StaticMetrics};
pub use pipeline::{RouteOutcome, RouteRequest, RouteTrace, TieredRouter};
pub use router::{decide, ComplexityScore, RoutingDecision};
pub use store::{
    BlobStore, InMemoryJobStore, JobStore, RestBlobStore, RestJobStore, StaticBlobStore,
    SyntheticJobStore,
};
pub use tier::{AnalysisKind, JobAction, JobPriority, RiskLevel, Tier};

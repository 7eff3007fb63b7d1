//! Escalation trigger table
//!
//! Triggers are static rows: a name, a severity, an action, a cooldown, and
//! a pure predicate over [`EscalationContext`]. The table is enumerable and
//! serialises for audit (predicates are skipped).

use serde::{Deserialize, Serialize};

use super::error_class::ErrorCategory;
use crate::complexity::RequesterTier;

/// How serious a fired trigger is. Ordered low → critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for TriggerSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// What firing a trigger asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerAction {
    Monitor,
    Warn,
    Escalate,
    Emergency,
}

impl TriggerAction {
    /// `monitor`/`warn` are informational only.
    pub fn escalates(&self) -> bool {
        matches!(self, Self::Escalate | Self::Emergency)
    }
}

/// Per-call facts the predicates are evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationContext {
    /// Attempts made for this job so far, including the current one
    pub attempt_count: u32,
    /// Failed attempts on the fast (primary) tier
    pub tier1_failures: u32,
    /// Failed attempts on any tier
    pub failure_count: u32,
    /// Total elapsed time for the job across attempts
    pub elapsed_ms: u64,
    pub error_categories: Vec<ErrorCategory>,
    pub system_load: f64,
    /// This call is itself a retry
    pub is_retry: bool,
    pub requester_tier: RequesterTier,
}

/// One escalation rule.
#[derive(Clone, Copy, Serialize)]
pub struct EscalationTrigger {
    pub name: &'static str,
    pub description: &'static str,
    pub severity: TriggerSeverity,
    pub action: TriggerAction,
    pub cooldown_ms: u64,
    #[serde(skip)]
    pub predicate: fn(&EscalationContext) -> bool,
}

impl std::fmt::Debug for EscalationTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EscalationTrigger")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .field("action", &self.action)
            .field("cooldown_ms", &self.cooldown_ms)
            .finish_non_exhaustive()
    }
}

impl EscalationTrigger {
    pub fn matches(&self, context: &EscalationContext) -> bool {
        (self.predicate)(context)
    }
}

fn repeated_failures(c: &EscalationContext) -> bool {
    c.tier1_failures >= 2
}

fn timeout_exceeded(c: &EscalationContext) -> bool {
    c.elapsed_ms > 30_000
}

fn critical_error_pattern(c: &EscalationContext) -> bool {
    c.error_categories.iter().any(ErrorCategory::is_critical)
}

fn system_overload(c: &EscalationContext) -> bool {
    c.system_load > 0.8
}

fn premium_user_timeout(c: &EscalationContext) -> bool {
    c.requester_tier == RequesterTier::Premium && c.elapsed_ms > 20_000
}

fn enterprise_any_failure(c: &EscalationContext) -> bool {
    c.requester_tier == RequesterTier::Enterprise && c.failure_count > 0
}

fn retry_loop_detected(c: &EscalationContext) -> bool {
    c.attempt_count >= 3 && c.is_retry
}

/// The default rule set, evaluated in declaration order.
pub const DEFAULT_TRIGGERS: &[EscalationTrigger] = &[
    EscalationTrigger {
        name: "repeated_failures",
        description: "two or more failed attempts on the fast tier",
        severity: TriggerSeverity::High,
        action: TriggerAction::Escalate,
        cooldown_ms: 0,
        predicate: repeated_failures,
    },
    EscalationTrigger {
        name: "timeout_exceeded",
        description: "job has been running for more than 30s",
        severity: TriggerSeverity::Medium,
        action: TriggerAction::Escalate,
        cooldown_ms: 5_000,
        predicate: timeout_exceeded,
    },
    EscalationTrigger {
        name: "critical_error_pattern",
        description: "deployment-sync, database or storage-access error observed",
        severity: TriggerSeverity::High,
        action: TriggerAction::Escalate,
        cooldown_ms: 0,
        predicate: critical_error_pattern,
    },
    EscalationTrigger {
        name: "system_overload",
        description: "system load above 0.8",
        severity: TriggerSeverity::Medium,
        action: TriggerAction::Escalate,
        cooldown_ms: 10_000,
        predicate: system_overload,
    },
    EscalationTrigger {
        name: "premium_user_timeout",
        description: "premium requester waiting more than 20s",
        severity: TriggerSeverity::Medium,
        action: TriggerAction::Escalate,
        cooldown_ms: 0,
        predicate: premium_user_timeout,
    },
    EscalationTrigger {
        name: "enterprise_any_failure",
        description: "enterprise requester with any failure",
        severity: TriggerSeverity::High,
        action: TriggerAction::Escalate,
        cooldown_ms: 0,
        predicate: enterprise_any_failure,
    },
    EscalationTrigger {
        name: "retry_loop_detected",
        description: "third or later attempt arriving as a retry",
        severity: TriggerSeverity::Critical,
        action: TriggerAction::Emergency,
        cooldown_ms: 0,
        predicate: retry_loop_detected,
    },
];

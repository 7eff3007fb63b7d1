//! Routing Decision Engine: pure precedence rules over the four snapshots.
//!
//! First match wins:
//! 1. escalation forces the comprehensive tier
//! 2. an explicit override is honoured verbatim
//! 3. critical priority goes comprehensive with a fast fallback
//! 4. no healthy tier is a hard failure
//! 5. a single healthy tier is used as-is
//! 6. otherwise the complexity score picks the tier

use serde::{Deserialize, Serialize};

use super::scoring::{ComplexityScore, ScoringInput};
use crate::complexity::OrderComplexity;
use crate::error::RouterError;
use crate::escalation::{EscalationResult, TriggerSeverity};
use crate::health::SystemHealth;
use crate::metrics::PerformanceMetrics;
use crate::tier::{JobPriority, RiskLevel, Tier};

/// Score at or above which the comprehensive tier is preferred.
pub const COMPREHENSIVE_THRESHOLD: i32 = 4;
/// Score at or below which the fast tier is a confident choice.
pub const FAST_THRESHOLD: i32 = 1;
/// Per-item ETA on the fast tier for borderline jobs.
const BORDERLINE_PER_ITEM_MS: u64 = 1_500;

/// Which tier serves a job, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub selected_tier: Tier,
    /// Human-readable trace of the rule that matched
    pub reason: String,
    /// 0..1
    pub confidence: f64,
    pub fallback_tier: Option<Tier>,
    pub estimated_duration_ms: u64,
    pub risk_level: RiskLevel,
    /// Complexity score, present only when the score decided the route
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub factors: Vec<String>,
}

impl RoutingDecision {
    fn new(
        selected_tier: Tier,
        reason: String,
        confidence: f64,
        fallback_tier: Option<Tier>,
        estimated_duration_ms: u64,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            selected_tier,
            reason,
            confidence,
            fallback_tier,
            estimated_duration_ms,
            risk_level,
            score: None,
            factors: Vec::new(),
        }
    }
}

/// Decide where a job goes. Performs no I/O and mutates nothing.
pub fn decide(
    health: &SystemHealth,
    complexity: &OrderComplexity,
    metrics: &PerformanceMetrics,
    escalation: &EscalationResult,
    priority: JobPriority,
    tier_override: Option<Tier>,
) -> Result<RoutingDecision, RouterError> {
    let items = complexity.item_count;

    if escalation.should_escalate {
        let risk = if escalation.severity == TriggerSeverity::Critical {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        let triggers = escalation.escalation_reason().unwrap_or_default();
        return Ok(RoutingDecision::new(
            Tier::Comprehensive,
            format!("Escalated ({} severity): {}", escalation.severity, triggers),
            0.95,
            None,
            Tier::Comprehensive.estimate_ms(items),
            risk,
        ));
    }

    if let Some(tier) = tier_override {
        return Ok(RoutingDecision::new(
            tier,
            format!("Explicit override to {} tier", tier),
            1.0,
            None,
            tier.estimate_ms(items),
            RiskLevel::Low,
        ));
    }

    if priority == JobPriority::Critical {
        return Ok(RoutingDecision::new(
            Tier::Comprehensive,
            "Critical priority job".to_string(),
            0.95,
            Some(Tier::Fast),
            Tier::Comprehensive.estimate_ms(items),
            RiskLevel::High,
        ));
    }

    match (health.fast_available, health.comprehensive_available) {
        (false, false) => return Err(RouterError::AllTiersUnavailable),
        (true, false) => {
            return Ok(RoutingDecision::new(
                Tier::Fast,
                "Only the fast tier is healthy".to_string(),
                0.8,
                None,
                Tier::Fast.estimate_ms(items),
                RiskLevel::Medium,
            ))
        }
        (false, true) => {
            return Ok(RoutingDecision::new(
                Tier::Comprehensive,
                "Only the comprehensive tier is healthy".to_string(),
                0.7,
                None,
                Tier::Comprehensive.estimate_ms(items),
                RiskLevel::Medium,
            ))
        }
        (true, true) => {}
    }

    let score = ComplexityScore::compute(&ScoringInput {
        health,
        complexity,
        metrics,
    });
    let confidence = score.confidence();

    let mut decision = if score.total >= COMPREHENSIVE_THRESHOLD {
        let risk = if score.total >= 6 {
            RiskLevel::High
        } else {
            RiskLevel::Medium
        };
        RoutingDecision::new(
            Tier::Comprehensive,
            format!("High complexity score {}", score),
            confidence,
            Some(Tier::Fast),
            Tier::Comprehensive.estimate_ms(items),
            risk,
        )
    } else if score.total <= FAST_THRESHOLD {
        RoutingDecision::new(
            Tier::Fast,
            format!("Low complexity score {}", score),
            confidence,
            Some(Tier::Comprehensive),
            Tier::Fast.estimate_ms(items),
            RiskLevel::Low,
        )
    } else {
        let (base, _) = Tier::Fast.eta_profile();
        RoutingDecision::new(
            Tier::Fast,
            format!("Borderline complexity score {}, preferring fast tier", score),
            confidence * 0.8,
            Some(Tier::Comprehensive),
            base + BORDERLINE_PER_ITEM_MS * u64::from(items),
            RiskLevel::Medium,
        )
    };
    decision.score = Some(score.total);
    decision.factors = score.factors;
    Ok(decision)
}

//! Complexity score as a fold over an ordered factor table.

use serde::{Deserialize, Serialize};

use crate::complexity::{OrderComplexity, RequesterTier};
use crate::health::SystemHealth;
use crate::metrics::PerformanceMetrics;

/// Score at which confidence peaks.
pub const BALANCED_SCORE: i32 = 3;

/// Everything a factor may look at.
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub health: &'a SystemHealth,
    pub complexity: &'a OrderComplexity,
    pub metrics: &'a PerformanceMetrics,
}

/// One weighted row of the scoring table.
#[derive(Clone, Copy)]
pub struct ScoreFactor {
    pub label: &'static str,
    pub weight: i32,
    applies: fn(&ScoringInput<'_>) -> bool,
}

impl ScoreFactor {
    pub fn applies(&self, input: &ScoringInput<'_>) -> bool {
        (self.applies)(input)
    }
}

/// Ordered scoring table. Item-count and size bands are mutually exclusive rows.
pub const FACTORS: &[ScoreFactor] = &[
    ScoreFactor {
        label: "many_items",
        weight: 2,
        applies: |i| i.complexity.item_count > 5,
    },
    ScoreFactor {
        label: "multiple_items",
        weight: 1,
        applies: |i| i.complexity.item_count > 1 && i.complexity.item_count <= 5,
    },
    ScoreFactor {
        label: "large_batch",
        weight: 2,
        applies: |i| i.complexity.total_size_mb > 50.0,
    },
    ScoreFactor {
        label: "medium_batch",
        weight: 1,
        applies: |i| i.complexity.total_size_mb > 20.0 && i.complexity.total_size_mb <= 50.0,
    },
    ScoreFactor {
        label: "failure_history",
        weight: 3,
        applies: |i| i.complexity.has_failure_history,
    },
    ScoreFactor {
        label: "reprocessing",
        weight: 2,
        applies: |i| i.complexity.is_reprocessing,
    },
    ScoreFactor {
        label: "custom_analysis",
        weight: 2,
        applies: |i| i.complexity.requires_custom_analysis,
    },
    ScoreFactor {
        label: "enterprise_requester",
        weight: 1,
        applies: |i| i.complexity.requester_tier == RequesterTier::Enterprise,
    },
    ScoreFactor {
        label: "fast_tier_unreliable",
        weight: 2,
        applies: |i| i.metrics.tier_a_success_rate < 0.8,
    },
    ScoreFactor {
        label: "high_load",
        weight: 1,
        applies: |i| i.metrics.system_load > 0.7,
    },
    ScoreFactor {
        label: "high_error_rate",
        weight: 2,
        applies: |i| i.metrics.error_rate > 0.2,
    },
    ScoreFactor {
        label: "analysis_offline",
        weight: -3,
        applies: |i| !i.health.analysis_service_online,
    },
];

/// Total score and the labels of the factors that contributed to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScore {
    pub total: i32,
    pub factors: Vec<String>,
}

impl ComplexityScore {
    pub fn compute(input: &ScoringInput<'_>) -> Self {
        FACTORS
            .iter()
            .filter(|factor| factor.applies(input))
            .fold(Self::default(), |mut acc, factor| {
                acc.total += factor.weight;
                acc.factors.push(factor.label.to_string());
                acc
            })
    }

    /// Peaks at 0.8 for the balanced score and falls 0.05 per point either way.
    pub fn confidence(&self) -> f64 {
        let distance = f64::from((self.total - BALANCED_SCORE).abs());
        (0.8 - distance * 0.05).clamp(0.6, 0.95)
    }
}

impl std::fmt::Display for ComplexityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.factors.is_empty() {
            write!(f, "{} (no factors)", self.total)
        } else {
            write!(f, "{} ({})", self.total, self.factors.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score_of(complexity: &OrderComplexity, metrics: &PerformanceMetrics) -> ComplexityScore {
        ComplexityScore::compute(&ScoringInput {
            health: &SystemHealth::all_up(),
            complexity,
            metrics,
        })
    }

    #[test]
    fn test_simple_job_scores_zero() {
        let s = score_of(&OrderComplexity::simple("j"), &PerformanceMetrics::default());
        assert_eq!(s.total, 0);
        assert!(s.factors.is_empty());
    }

    #[test]
    fn test_item_and_size_bands_are_exclusive() {
        let mut c = OrderComplexity::simple("j");
        c.item_count = 6;
        c.total_size_mb = 51.0;
        let s = score_of(&c, &PerformanceMetrics::default());
        assert_eq!(s.total, 4);
        assert_eq!(s.factors, vec!["many_items", "large_batch"]);

        c.item_count = 5;
        c.total_size_mb = 50.0;
        let s = score_of(&c, &PerformanceMetrics::default());
        assert_eq!(s.total, 2);
        assert_eq!(s.factors, vec!["multiple_items", "medium_batch"]);

        c.total_size_mb = 20.0;
        assert_eq!(score_of(&c, &PerformanceMetrics::default()).total, 1);
    }

    #[test]
    fn test_every_job_factor() {
        let c = OrderComplexity {
            has_failure_history: true,
            is_reprocessing: true,
            requires_custom_analysis: true,
            requester_tier: RequesterTier::Enterprise,
            ..OrderComplexity::simple("j")
        };
        let s = score_of(&c, &PerformanceMetrics::default());
        assert_eq!(s.total, 3 + 2 + 2 + 1);
    }

    #[test]
    fn test_metric_factors() {
        let m = PerformanceMetrics {
            tier_a_success_rate: 0.79,
            system_load: 0.71,
            error_rate: 0.21,
            ..PerformanceMetrics::default()
        };
        let s = score_of(&OrderComplexity::simple("j"), &m);
        assert_eq!(s.total, 5);
        assert_eq!(
            s.factors,
            vec!["fast_tier_unreliable", "high_load", "high_error_rate"]
        );
    }

    #[test]
    fn test_analysis_offline_subtracts() {
        let health = SystemHealth {
            analysis_service_online: false,
            ..SystemHealth::all_up()
        };
        let c = OrderComplexity {
            has_failure_history: true,
            ..OrderComplexity::simple("j")
        };
        let s = ComplexityScore::compute(&ScoringInput {
            health: &health,
            complexity: &c,
            metrics: &PerformanceMetrics::default(),
        });
        assert_eq!(s.total, 0);
        assert_eq!(s.factors, vec!["failure_history", "analysis_offline"]);
    }

    #[test]
    fn test_confidence_curve() {
        let conf = |total| ComplexityScore {
            total,
            factors: vec![],
        }
        .confidence();
        assert!((conf(3) - 0.8).abs() < 1e-9);
        assert!((conf(1) - 0.7).abs() < 1e-9);
        assert!((conf(5) - 0.7).abs() < 1e-9);
        assert!((conf(0) - 0.65).abs() < 1e-9);
        assert_eq!(conf(-10), 0.6);
        assert_eq!(conf(20), 0.6);
    }
}

//! Processing tiers and the small enums shared across the routing pipeline.

use serde::{Deserialize, Serialize};

/// The two processing backends a job can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Tier 1: low-latency, best-effort batch processing.
    #[serde(alias = "tier1")]
    Fast,
    /// Tier 2: multi-step orchestration for complex or escalated jobs.
    #[serde(alias = "tier2")]
    Comprehensive,
}

impl Tier {
    /// The other tier.
    pub fn alternate(&self) -> Self {
        match self {
            Self::Fast => Self::Comprehensive,
            Self::Comprehensive => Self::Fast,
        }
    }

    /// Baseline and per-item ETA in milliseconds for a job that takes the
    /// tier's straightforward path.
    pub fn eta_profile(&self) -> (u64, u64) {
        match self {
            Self::Fast => (6_000, 1_000),
            Self::Comprehensive => (15_000, 3_000),
        }
    }

    /// Estimated duration for `item_count` items on the straightforward path.
    pub fn estimate_ms(&self, item_count: u32) -> u64 {
        let (base, per_item) = self.eta_profile();
        base + per_item * u64::from(item_count)
    }

    pub fn all() -> &'static [Tier] {
        &[Tier::Fast, Tier::Comprehensive]
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

/// Risk attached to a routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Caller-assigned job priority.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    #[default]
    Standard,
    High,
    Critical,
}

/// What the caller wants done with the job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    #[default]
    Process,
    Recover,
    Validate,
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Recover => write!(f, "recover"),
            Self::Validate => write!(f, "validate"),
        }
    }
}

/// Kind of metadata analysis the backends run on each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    #[default]
    Lifestyle,
    Product,
}

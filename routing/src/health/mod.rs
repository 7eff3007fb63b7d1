//! Health probing of the router's collaborators.
//!
//! A [`SystemHealth`] snapshot is rebuilt on every routing call and never
//! persisted. Probe failures degrade a capability to unavailable; they are
//! never raised as errors.

pub mod prober;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use prober::{HealthProber, ProbeConfig, ProbeCounters, ProbeCountersSnapshot, ProbeOutcome};

/// Liveness of every capability the router depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    /// Tier 1 backend answered its synthetic probe
    pub fast_available: bool,
    /// Tier 2 backend answered its synthetic probe
    pub comprehensive_available: bool,
    pub store_responsive: bool,
    pub blob_accessible: bool,
    pub analysis_service_online: bool,
}

impl SystemHealth {
    /// Every capability up.
    pub fn all_up() -> Self {
        Self {
            fast_available: true,
            comprehensive_available: true,
            store_responsive: true,
            blob_accessible: true,
            analysis_service_online: true,
        }
    }

    pub fn tier_available(&self, tier: crate::tier::Tier) -> bool {
        match tier {
            crate::tier::Tier::Fast => self.fast_available,
            crate::tier::Tier::Comprehensive => self.comprehensive_available,
        }
    }

    fn flags(&self) -> [bool; 5] {
        [
            self.fast_available,
            self.comprehensive_available,
            self.store_responsive,
            self.blob_accessible,
            self.analysis_service_online,
        ]
    }

    /// Roll the individual flags up into one status.
    pub fn overall(&self) -> OverallStatus {
        let flags = self.flags();
        if flags.iter().all(|up| *up) {
            OverallStatus::Healthy
        } else if flags.iter().any(|up| *up) {
            OverallStatus::Degraded
        } else {
            OverallStatus::Unhealthy
        }
    }
}

/// Aggregate health across all capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// A probe round: flags, roll-up, and why each failing capability failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub health: SystemHealth,
    pub overall: OverallStatus,
    /// Capability name → failure description, for failing capabilities only.
    pub details: BTreeMap<String, String>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::Tier;

    #[test]
    fn test_overall_rollup() {
        assert_eq!(SystemHealth::all_up().overall(), OverallStatus::Healthy);
        assert_eq!(SystemHealth::default().overall(), OverallStatus::Unhealthy);

        let partial = SystemHealth {
            fast_available: false,
            ..SystemHealth::all_up()
        };
        assert_eq!(partial.overall(), OverallStatus::Degraded);
    }

    #[test]
    fn test_tier_available() {
        let health = SystemHealth {
            comprehensive_available: false,
            ..SystemHealth::all_up()
        };
        assert!(health.tier_available(Tier::Fast));
        assert!(!health.tier_available(Tier::Comprehensive));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(SystemHealth::all_up()).unwrap();
        assert_eq!(json["fastAvailable"], true);
        assert_eq!(json["analysisServiceOnline"], true);
    }
}

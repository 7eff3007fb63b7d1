//! Performance Metrics Provider
//!
//! Rolling success/latency/load statistics for both tiers. The provider is a
//! collaborator trait so a deployment can back it with an external metrics
//! system; [`RollingMetrics`] aggregates the router's own dispatch outcomes
//! over a trailing window.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::tier::Tier;

/// Recent performance of both tiers and of the system as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub tier_a_success_rate: f64,
    pub tier_a_avg_time_ms: f64,
    pub tier_b_success_rate: f64,
    pub tier_b_avg_time_ms: f64,
    /// In-flight work relative to capacity, 0–1
    pub system_load: f64,
    /// Failed attempts over all attempts, 0–1
    pub error_rate: f64,
}

impl Default for PerformanceMetrics {
    /// Optimistic baseline used before any outcome has been observed.
    fn default() -> Self {
        Self {
            tier_a_success_rate: 1.0,
            tier_a_avg_time_ms: Tier::Fast.eta_profile().0 as f64,
            tier_b_success_rate: 1.0,
            tier_b_avg_time_ms: Tier::Comprehensive.eta_profile().0 as f64,
            system_load: 0.0,
            error_rate: 0.0,
        }
    }
}

/// Decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    counter: Arc<AtomicU32>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Source of [`PerformanceMetrics`], optionally fed by dispatch outcomes.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Current view. Must reflect recent outcomes, never an indefinitely stale value.
    async fn snapshot(&self) -> PerformanceMetrics;

    /// Record one dispatch attempt.
    fn record_attempt(&self, _tier: Tier, _success: bool, _elapsed_ms: u64) {}

    /// Mark a dispatch as in flight until the guard drops.
    fn track_in_flight(&self) -> Option<InFlightGuard> {
        None
    }
}

/// Fixed metrics, for tests and deployments without history.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMetrics(pub PerformanceMetrics);

#[async_trait]
impl MetricsProvider for StaticMetrics {
    async fn snapshot(&self) -> PerformanceMetrics {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    tier: Tier,
    success: bool,
    elapsed_ms: u64,
}

/// Trailing-window aggregation of the router's own dispatch attempts.
#[derive(Debug)]
pub struct RollingMetrics {
    window: Duration,
    capacity: u32,
    samples: Mutex<VecDeque<Sample>>,
    in_flight: Arc<AtomicU32>,
}

impl RollingMetrics {
    pub fn new(window: Duration, capacity: u32) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            samples: Mutex::new(VecDeque::new()),
            in_flight: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn in_flight(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn compute(&self, now: Instant) -> PerformanceMetrics {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        while let Some(front) = samples.front() {
            if now.duration_since(front.at) > self.window {
                samples.pop_front();
            } else {
                break;
            }
        }

        let baseline = PerformanceMetrics::default();
        let (a_rate, a_avg) = tier_stats(&samples, Tier::Fast)
            .unwrap_or((baseline.tier_a_success_rate, baseline.tier_a_avg_time_ms));
        let (b_rate, b_avg) = tier_stats(&samples, Tier::Comprehensive)
            .unwrap_or((baseline.tier_b_success_rate, baseline.tier_b_avg_time_ms));

        let error_rate = if samples.is_empty() {
            0.0
        } else {
            samples.iter().filter(|s| !s.success).count() as f64 / samples.len() as f64
        };

        PerformanceMetrics {
            tier_a_success_rate: a_rate,
            tier_a_avg_time_ms: a_avg,
            tier_b_success_rate: b_rate,
            tier_b_avg_time_ms: b_avg,
            system_load: (self.in_flight() as f64 / self.capacity as f64).clamp(0.0, 1.0),
            error_rate,
        }
    }
}

fn tier_stats(samples: &VecDeque<Sample>, tier: Tier) -> Option<(f64, f64)> {
    let (count, ok, total_ms) = samples
        .iter()
        .filter(|s| s.tier == tier)
        .fold((0u64, 0u64, 0u64), |(n, ok, ms), s| {
            (n + 1, ok + u64::from(s.success), ms + s.elapsed_ms)
        });
    if count == 0 {
        return None;
    }
    Some((ok as f64 / count as f64, total_ms as f64 / count as f64))
}

#[async_trait]
impl MetricsProvider for RollingMetrics {
    async fn snapshot(&self) -> PerformanceMetrics {
        self.compute(Instant::now())
    }

    fn record_attempt(&self, tier: Tier, success: bool, elapsed_ms: u64) {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.push_back(Sample {
            at: Instant::now(),
            tier,
            success,
            elapsed_ms,
        });
    }

    fn track_in_flight(&self) -> Option<InFlightGuard> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(InFlightGuard {
            counter: Arc::clone(&self.in_flight),
        })
    }
}

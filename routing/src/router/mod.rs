//! Routing Decision Engine
//!
//! Combines health, complexity, metrics and escalation into a
//! [`RoutingDecision`]. Everything here is pure.

pub mod decision;
pub mod scoring;

pub use decision::{decide, RoutingDecision, COMPREHENSIVE_THRESHOLD, FAST_THRESHOLD};
pub use scoring::{ComplexityScore, ScoreFactor, ScoringInput, FACTORS};

//! Escalation Trigger Engine
//!
//! Decides whether a job must be forced onto the comprehensive tier.
//!
//! ```text
//! EscalationContext ──► [trigger table, in order] ──► EscalationResult
//!                              │        ▲
//!                              ▼        │
//!                         CooldownStore (shared, per process)
//! ```

pub mod cooldown;
pub mod engine;
pub mod error_class;
pub mod triggers;

pub use cooldown::{CooldownReservation, CooldownStore};
pub use engine::{EscalationEngine, EscalationResult, FiredTrigger, PendingEscalation};
pub use error_class::ErrorCategory;
pub use triggers::{
    EscalationContext, EscalationTrigger, TriggerAction, TriggerSeverity, DEFAULT_TRIGGERS,
};

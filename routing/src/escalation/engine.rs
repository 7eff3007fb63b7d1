//! Escalation Engine: deterministic rule evaluation with cooldowns.
//!
//! Walks the trigger table in declaration order. A trigger still inside its
//! cooldown window is skipped without evaluating its predicate. Every trigger
//! that fires is recorded and stamped; only `escalate`/`emergency` triggers
//! set `should_escalate`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cooldown::{CooldownReservation, CooldownStore};
use super::triggers::{
    EscalationContext, EscalationTrigger, TriggerAction, TriggerSeverity, DEFAULT_TRIGGERS,
};

/// One trigger that fired during an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiredTrigger {
    pub name: String,
    pub severity: TriggerSeverity,
    pub action: TriggerAction,
}

/// Outcome of evaluating the rule set once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationResult {
    pub should_escalate: bool,
    /// Highest severity among fired triggers; `low` when none fired
    pub severity: TriggerSeverity,
    pub triggered: Vec<FiredTrigger>,
    /// Triggers skipped because their cooldown had not elapsed
    pub cooling_down: Vec<String>,
    pub recommended_action: String,
}

impl EscalationResult {
    /// Nothing fired.
    pub fn none() -> Self {
        Self {
            should_escalate: false,
            severity: TriggerSeverity::Low,
            triggered: Vec::new(),
            cooling_down: Vec::new(),
            recommended_action: recommended_action(false, TriggerSeverity::Low),
        }
    }

    /// Names of the escalating triggers, joined for the comprehensive backend.
    pub fn escalation_reason(&self) -> Option<String> {
        let names: Vec<&str> = self
            .triggered
            .iter()
            .filter(|t| t.action.escalates())
            .map(|t| t.name.as_str())
            .collect();
        if names.is_empty() {
            None
        } else {
            Some(names.join(", "))
        }
    }
}

fn recommended_action(should_escalate: bool, severity: TriggerSeverity) -> String {
    if severity == TriggerSeverity::Critical {
        "emergency escalation with priority handling".to_string()
    } else if should_escalate {
        format!("escalate ({})", severity)
    } else {
        "continue with current tier".to_string()
    }
}

/// An evaluation whose cooldown stamps are not yet committed.
///
/// Dropping it without calling [`commit`](Self::commit) undoes the stamps, so
/// an aborted routing call leaves the cooldown table as it found it.
#[derive(Debug)]
pub struct PendingEscalation {
    result: EscalationResult,
    reservation: CooldownReservation,
}

impl PendingEscalation {
    pub fn result(&self) -> &EscalationResult {
        &self.result
    }

    pub fn commit(self) -> EscalationResult {
        self.reservation.commit();
        self.result
    }
}

/// The Escalation Engine
#[derive(Debug, Clone)]
pub struct EscalationEngine {
    triggers: Vec<EscalationTrigger>,
    cooldowns: CooldownStore,
}

impl EscalationEngine {
    /// Engine over the default trigger table.
    pub fn new(cooldowns: CooldownStore) -> Self {
        Self::with_triggers(DEFAULT_TRIGGERS.to_vec(), cooldowns)
    }

    pub fn with_triggers(triggers: Vec<EscalationTrigger>, cooldowns: CooldownStore) -> Self {
        Self {
            triggers,
            cooldowns,
        }
    }

    pub fn triggers(&self) -> &[EscalationTrigger] {
        &self.triggers
    }

    pub fn cooldowns(&self) -> &CooldownStore {
        &self.cooldowns
    }

    /// Evaluate and commit immediately.
    pub fn evaluate(&self, context: &EscalationContext, now: DateTime<Utc>) -> EscalationResult {
        self.begin(context, now).commit()
    }

    /// Evaluate, reserving cooldown stamps until the caller commits.
    pub fn begin(&self, context: &EscalationContext, now: DateTime<Utc>) -> PendingEscalation {
        let mut reservation = self.cooldowns.reservation();
        let mut triggered = Vec::new();
        let mut cooling_down = Vec::new();
        let mut should_escalate = false;
        let mut severity = TriggerSeverity::Low;

        {
            let mut map = self.cooldowns.lock();
            for trigger in &self.triggers {
                if let Some(last) = map.get(trigger.name) {
                    // A clock stepped backwards counts as elapsed.
                    let since_ms = (now - *last).num_milliseconds();
                    if since_ms >= 0 && since_ms < trigger.cooldown_ms as i64 {
                        cooling_down.push(trigger.name.to_string());
                        continue;
                    }
                }

                if !trigger.matches(context) {
                    continue;
                }

                info!(
                    trigger = trigger.name,
                    severity = %trigger.severity,
                    action = ?trigger.action,
                    "Escalation trigger fired"
                );
                reservation.stamp(&mut map, trigger.name, now);
                should_escalate |= trigger.action.escalates();
                severity = severity.max(trigger.severity);
                triggered.push(FiredTrigger {
                    name: trigger.name.to_string(),
                    severity: trigger.severity,
                    action: trigger.action,
                });
            }
        }

        PendingEscalation {
            result: EscalationResult {
                should_escalate,
                severity,
                triggered,
                cooling_down,
                recommended_action: recommended_action(should_escalate, severity),
            },
            reservation,
        }
    }
}

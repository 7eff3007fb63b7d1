//! Cooldown state shared by every routing call in the process.
//!
//! Maps trigger name to the timestamp it last fired. Evaluation holds the
//! lock for the whole rule pass, so two concurrent calls can never both see
//! an elapsed cooldown for the same trigger. Timestamps written during a pass
//! are held in a [`CooldownReservation`] until the routing call completes; an
//! uncommitted reservation rolls them back when dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

type CooldownMap = HashMap<String, DateTime<Utc>>;

/// Injectable trigger → last-fired table. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CooldownStore {
    inner: Arc<Mutex<CooldownMap>>,
}

impl CooldownStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` as having fired at `at`.
    pub fn seed(&self, name: &str, at: DateTime<Utc>) {
        self.lock().insert(name.to_string(), at);
    }

    pub fn last_fired(&self, name: &str) -> Option<DateTime<Utc>> {
        self.lock().get(name).copied()
    }

    /// Sorted copy of the table.
    pub fn snapshot(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.lock()
            .iter()
            .map(|(name, at)| (name.clone(), *at))
            .collect()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, CooldownMap> {
        // A panic while holding the lock cannot leave the map half-written.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn reservation(&self) -> CooldownReservation {
        CooldownReservation {
            store: self.clone(),
            entries: Vec::new(),
            committed: false,
        }
    }
}

#[derive(Debug)]
struct Reserved {
    name: String,
    previous: Option<DateTime<Utc>>,
    stamped: DateTime<Utc>,
}

/// Timestamps written by one evaluation, pending commit.
#[derive(Debug)]
#[must_use = "dropping a reservation rolls its cooldown timestamps back"]
pub struct CooldownReservation {
    store: CooldownStore,
    entries: Vec<Reserved>,
    committed: bool,
}

impl CooldownReservation {
    /// Stamp `name` at `now` in an already-locked map.
    pub(crate) fn stamp(&mut self, map: &mut CooldownMap, name: &str, now: DateTime<Utc>) {
        let previous = map.insert(name.to_string(), now);
        self.entries.push(Reserved {
            name: name.to_string(),
            previous,
            stamped: now,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep the reserved timestamps.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for CooldownReservation {
    fn drop(&mut self) {
        if self.committed || self.entries.is_empty() {
            return;
        }
        let mut map = self.store.lock();
        for entry in self.entries.drain(..).rev() {
            // A later evaluation may have re-stamped the trigger; leave its value alone.
            if map.get(&entry.name) != Some(&entry.stamped) {
                continue;
            }
            match entry.previous {
                Some(previous) => {
                    map.insert(entry.name, previous);
                }
                None => {
                    map.remove(&entry.name);
                }
            }
        }
        tracing::debug!("Rolled back uncommitted cooldown reservation");
    }
}

//! Per-key debouncing
//!
//! Turns bursts of raw notifications into a single semantic event. Each key
//! (a child name, or the empty key for the root) owns at most one slot. Arming
//! an occupied slot pushes its deadline back and keeps the original action,
//! so a pending `add` is not turned into a `change` by the writes that follow
//! the creation.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

struct Slot<A> {
    deadline: Instant,
    action: A,
}

/// Debounce timers keyed by child name
pub struct DebounceTable<A> {
    window: Duration,
    slots: HashMap<String, Slot<A>>,
}

impl<A> DebounceTable<A> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: HashMap::new(),
        }
    }

    /// Arm the slot for `key`, or re-arm it if a timer is already pending
    ///
    /// Returns true when a new slot was created.
    pub fn arm(&mut self, key: &str, now: Instant, action: impl FnOnce() -> A) -> bool {
        let deadline = now + self.window;
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.deadline = deadline;
                false
            }
            None => {
                self.slots.insert(
                    key.to_string(),
                    Slot {
                        deadline,
                        action: action(),
                    },
                );
                true
            }
        }
    }

    /// Cancel the pending timer for `key` without firing it
    pub fn cancel(&mut self, key: &str) -> Option<A> {
        self.slots.remove(key).map(|slot| slot.action)
    }

    /// Drop every pending timer without firing
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots.values().map(|slot| slot.deadline).min()
    }

    /// Remove and return every slot whose deadline has passed, oldest first
    pub fn take_due(&mut self, now: Instant) -> Vec<(String, A)> {
        let mut due: Vec<(Instant, String)> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.deadline <= now)
            .map(|(key, slot)| (slot.deadline, key.clone()))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, key)| self.slots.remove(&key).map(|slot| (key, slot.action)))
            .collect()
    }
}

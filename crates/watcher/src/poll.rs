//! Recovery while the watched root does not exist
//!
//! Re-runs reconciliation at a fixed interval. Every reconciliation that
//! still finds the root missing re-arms the poller; once the root is back,
//! nothing re-arms it and it retires on its own.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct MissingPoller {
    interval: Duration,
    deadline: Option<Instant>,
}

impl MissingPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Schedule the next poll one interval after `now`
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending poll if it is due
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

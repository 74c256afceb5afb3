//! Bounded retry for transient permission failures
//!
//! Some platforms report `EPERM` for a handle that is racing a delete or an
//! antivirus scan. Such failures are retried a fixed number of times with an
//! easing delay before the operation is considered to have failed.

use crate::config::WatchOptions;
use std::time::Duration;

/// Retry parameters shared by every operation of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub easing: Duration,
}

impl RetryPolicy {
    pub fn from_options(options: &WatchOptions) -> Self {
        Self {
            retries: options.eperm_retries,
            easing: options.eperm_easing(),
        }
    }

    /// Fresh budget for one operation
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            remaining: self.retries,
            easing: self.easing,
        }
    }
}

/// Remaining retries for a single operation
///
/// The budget is carried across attempts of the same operation, never shared
/// between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: u32,
    easing: Duration,
}

impl RetryBudget {
    /// Spend one retry, returning the delay to wait before re-attempting
    ///
    /// `None` means the budget is exhausted.
    pub fn consume(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.easing)
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

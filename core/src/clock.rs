//! Time source
//!
//! Authorization windows and ledger timestamps are expressed in unix
//! seconds. Components take a `Clock` so tests can pin the time.

use chrono::Utc;

#[cfg(test)]
use mockall::automock;

/// Source of the current unix time in seconds
#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    /// Current unix time in seconds
    fn now(&self) -> u64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        u64::try_from(Utc::now().timestamp()).unwrap_or(0)
    }
}

/// A clock frozen at a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.0
    }
}

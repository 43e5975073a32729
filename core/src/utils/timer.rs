//! Stage timing
//!
//! Engines and the client pipeline wrap slow stages (homomorphic evaluation,
//! ledger confirmation) in a [`Timer`] that logs on drop, louder once a
//! threshold is crossed.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

/// Timer for measuring execution time
#[derive(Debug, Clone)]
pub struct Timer {
    /// Name of the timed stage
    name: String,

    start: Instant,

    /// Log at info level past this
    warning_threshold: Option<Duration>,

    /// Log at warn level past this
    error_threshold: Option<Duration>,

    /// Whether to log automatically on drop
    log_on_drop: bool,
}

impl Timer {
    /// Start a timer for stage `name`
    pub fn new(name: impl Into<String>) -> Self {
        Timer {
            name: name.into(),
            start: Instant::now(),
            warning_threshold: None,
            error_threshold: None,
            log_on_drop: true,
        }
    }

    /// Set a warning threshold
    pub fn with_warning_threshold(mut self, threshold: Duration) -> Self {
        self.warning_threshold = Some(threshold);
        self
    }

    /// Set an error threshold
    pub fn with_error_threshold(mut self, threshold: Duration) -> Self {
        self.error_threshold = Some(threshold);
        self
    }

    /// Disable automatic logging on drop
    pub fn without_auto_log(mut self) -> Self {
        self.log_on_drop = false;
        self
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Whether the warning threshold was crossed
    pub fn has_warning(&self) -> bool {
        self.warning_threshold.map_or(false, |t| self.elapsed() > t)
    }

    /// Whether the error threshold was crossed
    pub fn has_error(&self) -> bool {
        self.error_threshold.map_or(false, |t| self.elapsed() > t)
    }

    /// Log the elapsed time at a level picked by the thresholds
    pub fn log(&self, message: impl Into<String>) {
        let msg = format!("{} {}: {:?}", self.name, message.into(), self.elapsed());

        if self.has_error() {
            warn!("{} [SLOW]", msg);
        } else if self.has_warning() {
            info!("{} [WARN]", msg);
        } else {
            debug!("{}", msg);
        }
    }

    /// Log and restart, returning the time since the previous checkpoint
    pub fn checkpoint(&mut self, name: impl Into<String>) -> Duration {
        let elapsed = self.elapsed();
        self.log(name);
        self.start = Instant::now();
        elapsed
    }
}

impl Display for Timer {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {:?}", self.name, self.elapsed())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if self.log_on_drop {
            self.log("completed");
        }
    }
}

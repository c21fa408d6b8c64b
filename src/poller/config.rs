//! Poll scheduling configuration.
//!
//! # Scheduling
//!
//! - **Interval**: one cycle every 60 seconds by default. A cycle that overruns
//!   delays the next tick rather than causing a burst of catch-up cycles.
//! - **Cycle timeout**: a cycle still running after 5 minutes is abandoned
//!   without writing Poller State.

use std::time::Duration;

/// Default interval between poll cycles (60 seconds).
const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Default bound on one cycle's wall time (5 minutes).
const DEFAULT_CYCLE_TIMEOUT_SECS: u64 = 300;

/// Configuration for the periodic poll task.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Interval between cycle starts.
    ///
    /// Default: 60 seconds.
    pub interval: Duration,

    /// Upper bound on a single cycle, fetch and dispatch included.
    ///
    /// Default: 5 minutes.
    pub cycle_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PollConfig {
    /// Creates a new `PollConfig` with default values.
    pub fn new() -> Self {
        PollConfig {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            cycle_timeout: Duration::from_secs(DEFAULT_CYCLE_TIMEOUT_SECS),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_cycle_timeout(mut self, cycle_timeout: Duration) -> Self {
        self.cycle_timeout = cycle_timeout;
        self
    }
}

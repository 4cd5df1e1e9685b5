//! Configuration for the booking workflow and deadline watchdog.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Tunables for the booking workflow and the deadline watchdog.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Budget a provider has to answer a PENDING booking before it is
    /// auto-rejected.
    pub response_window: Duration,
    /// Interval between watchdog scan cycles.
    pub scan_interval: StdDuration,
    /// Rating points deducted from a provider when a booking expires.
    pub timeout_penalty: u32,
    /// When true, creation fails with a conflict if the provider already
    /// has a CONFIRMED booking overlapping the requested slot.
    pub reject_schedule_conflicts: bool,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            response_window: Duration::minutes(5),
            scan_interval: StdDuration::from_secs(60),
            timeout_penalty: 5,
            reject_schedule_conflicts: false,
        }
    }
}

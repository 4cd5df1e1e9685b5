//! Observability metrics for the booking core.
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `atelia_booking_transitions_total` | Counter | `from_status`, `to_status`, `reason` | Booking status transitions |
//! | `atelia_booking_created_total` | Counter | - | Bookings created |
//! | `atelia_booking_expired_total` | Counter | - | Bookings auto-rejected by the watchdog |
//! | `atelia_booking_rating_penalties_total` | Counter | - | Reputation penalties applied |
//! | `atelia_watchdog_scans_total` | Counter | `status` | Watchdog scan cycles by outcome |
//! | `atelia_watchdog_scan_failures_total` | Counter | - | Per-booking expiry failures |
//! | `atelia_watchdog_scan_duration_seconds` | Histogram | - | Watchdog scan cycle duration |
//!
//! ## Integration
//!
//! Metrics are exposed via the `metrics` crate facade. To export to Prometheus:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

use crate::booking::{BookingStatus, TransitionReason};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Booking status transitions.
    pub const TRANSITIONS_TOTAL: &str = "atelia_booking_transitions_total";
    /// Counter: Bookings created.
    pub const CREATED_TOTAL: &str = "atelia_booking_created_total";
    /// Counter: Bookings auto-rejected by the watchdog.
    pub const EXPIRED_TOTAL: &str = "atelia_booking_expired_total";
    /// Counter: Reputation penalties applied.
    pub const RATING_PENALTIES_TOTAL: &str = "atelia_booking_rating_penalties_total";
    /// Counter: Watchdog scan cycles by outcome.
    pub const WATCHDOG_SCANS_TOTAL: &str = "atelia_watchdog_scans_total";
    /// Counter: Per-booking expiry failures during a scan.
    pub const WATCHDOG_SCAN_FAILURES_TOTAL: &str = "atelia_watchdog_scan_failures_total";
    /// Histogram: Watchdog scan cycle duration in seconds.
    pub const WATCHDOG_SCAN_DURATION_SECONDS: &str = "atelia_watchdog_scan_duration_seconds";
}

/// Label keys used across metrics.
pub mod labels {
    /// Previous booking status (for transitions).
    pub const FROM_STATUS: &str = "from_status";
    /// Target booking status (for transitions).
    pub const TO_STATUS: &str = "to_status";
    /// Transition reason.
    pub const REASON: &str = "reason";
    /// Outcome status (clean, partial, failed).
    pub const STATUS: &str = "status";
}

/// High-level interface for recording booking metrics.
///
/// Cheap to clone and share across tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingMetrics;

impl BookingMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Records a booking creation.
    pub fn record_created(&self) {
        counter!(names::CREATED_TOTAL).increment(1);
    }

    /// Records a booking status transition.
    pub fn record_transition(
        &self,
        from: BookingStatus,
        to: BookingStatus,
        reason: TransitionReason,
    ) {
        counter!(
            names::TRANSITIONS_TOTAL,
            labels::FROM_STATUS => from.as_label(),
            labels::TO_STATUS => to.as_label(),
            labels::REASON => reason.to_string(),
        )
        .increment(1);
    }

    /// Records a watchdog-driven expiry.
    pub fn record_expired(&self) {
        counter!(names::EXPIRED_TOTAL).increment(1);
    }

    /// Records a reputation penalty.
    pub fn record_rating_penalty(&self) {
        counter!(names::RATING_PENALTIES_TOTAL).increment(1);
    }

    /// Records the outcome of one watchdog scan cycle.
    pub fn record_scan(&self, status: &'static str) {
        counter!(
            names::WATCHDOG_SCANS_TOTAL,
            labels::STATUS => status,
        )
        .increment(1);
    }

    /// Records a per-booking failure during a scan cycle.
    pub fn record_scan_failure(&self) {
        counter!(names::WATCHDOG_SCAN_FAILURES_TOTAL).increment(1);
    }

    /// Records the duration of one watchdog scan cycle.
    pub fn observe_scan_duration(&self, duration: Duration) {
        histogram!(names::WATCHDOG_SCAN_DURATION_SECONDS).record(duration.as_secs_f64());
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the
    /// elapsed duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f(self.start.elapsed());
        }
    }
}

/// Creates a timing guard for watchdog scan metrics.
#[must_use]
pub fn time_watchdog_scan() -> TimingGuard<impl FnOnce(Duration)> {
    let metrics = BookingMetrics::new();
    TimingGuard::new(move |duration| metrics.observe_scan_duration(duration))
}

//! Deadline watchdog for unanswered booking requests.
//!
//! The watchdog periodically scans for PENDING bookings whose response
//! deadline has elapsed and expires each one: the booking is rejected
//! with the auto-reject flag, the provider's rating takes the configured
//! penalty, and both parties are notified.
//!
//! ## Race with the Provider's Answer
//!
//! Expiry goes through the same compare-and-set transition as the
//! provider's answer, so exactly one of them wins. A booking the
//! provider answered between the query and the expiry attempt is
//! skipped, not failed.
//!
//! ## Failure Isolation
//!
//! A failure while expiring one booking is logged and counted; the scan
//! continues with the remaining records and the next cycle retries
//! whatever is still expired. A crash between the store transition and
//! event publication can re-emit events; their idempotency keys make
//! the duplicates detectable downstream.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use atelia_core::UserId;

use crate::booking::{Booking, BookingStatus, TransitionCommand};
use crate::clock::Clock;
use crate::config::BookingConfig;
use crate::error::Result;
use crate::events::NotificationEvent;
use crate::metrics::{time_watchdog_scan, BookingMetrics};
use crate::outbox::EventSink;
use crate::reputation::{RatingAdjustment, ReputationStats};
use crate::store::{BookingStore, CasOutcome, ReputationStore};

/// Outcome of one watchdog scan cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Expired-and-pending bookings the query returned.
    pub scanned: usize,
    /// Bookings this cycle actually expired.
    pub expired: usize,
    /// Bookings skipped because the provider answered concurrently.
    pub skipped: usize,
    /// Bookings whose expiry failed; retried next cycle.
    pub failed: usize,
}

/// Periodic enforcer of the response deadline.
pub struct DeadlineWatchdog {
    bookings: Arc<dyn BookingStore>,
    reputation: Arc<dyn ReputationStore>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    metrics: BookingMetrics,
}

impl DeadlineWatchdog {
    /// Creates a new watchdog.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        reputation: Arc<dyn ReputationStore>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            bookings,
            reputation,
            clock,
            config,
            metrics: BookingMetrics::new(),
        }
    }

    /// Runs one scan cycle: queries expired PENDING bookings and expires
    /// each one.
    ///
    /// # Errors
    ///
    /// Returns an error only if the expiry query itself fails; per-record
    /// failures are isolated into [`ScanSummary::failed`].
    #[tracing::instrument(name = "watchdog_scan", skip(self, sink))]
    pub async fn scan_and_expire(&self, sink: &mut dyn EventSink) -> Result<ScanSummary> {
        let _timer = time_watchdog_scan();

        let now = self.clock.now();
        let candidates = self.bookings.expired_pending(now).await?;

        let mut summary = ScanSummary {
            scanned: candidates.len(),
            ..ScanSummary::default()
        };

        for booking in &candidates {
            match self.expire_one(booking, now, sink).await {
                Ok(true) => summary.expired += 1,
                Ok(false) => summary.skipped += 1,
                Err(error) => {
                    summary.failed += 1;
                    self.metrics.record_scan_failure();
                    tracing::error!(
                        booking_id = %booking.id,
                        error = %error,
                        "failed to expire booking, will retry next cycle"
                    );
                }
            }
        }

        let status = if summary.failed > 0 { "partial" } else { "clean" };
        self.metrics.record_scan(status);
        if summary.expired > 0 || summary.failed > 0 {
            tracing::info!(
                scanned = summary.scanned,
                expired = summary.expired,
                skipped = summary.skipped,
                failed = summary.failed,
                "watchdog scan finished"
            );
        }

        Ok(summary)
    }

    /// Runs the watchdog until the shutdown signal flips to true or the
    /// sender is dropped.
    ///
    /// The first scan runs after one full interval; bookings created
    /// just before startup are at most one interval late, well inside
    /// the deadline-to-expiry tolerance.
    pub async fn run(&self, mut sink: Box<dyn EventSink>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.scan_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately to align the interval.
        interval.tick().await;
        tracing::info!(
            interval_secs = self.config.scan_interval.as_secs(),
            "deadline watchdog started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(error) = self.scan_and_expire(sink.as_mut()).await {
                        tracing::error!(error = %error, "watchdog scan failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("deadline watchdog shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Awards rating points to a provider for sustained activity and
    /// notifies them.
    ///
    /// The rating saturates at 100; an award at the ceiling still emits
    /// the notification, with equal old and new ratings.
    pub async fn increase_rating_for_activity(
        &self,
        provider: UserId,
        points: u32,
        reason: &str,
        sink: &mut dyn EventSink,
    ) -> Result<RatingAdjustment> {
        let now = self.clock.now();
        let adjustment = self.reputation.reward(provider, points, now).await?;
        tracing::info!(
            provider_id = %provider,
            old_rating = adjustment.old_rating,
            new_rating = adjustment.new_rating,
            "provider rating award applied"
        );
        sink.push(NotificationEvent::reputation_changed(
            provider,
            adjustment.old_rating,
            adjustment.new_rating,
            reason,
            None,
            now,
        ));
        Ok(adjustment)
    }

    /// Returns aggregated statistics for a provider: rating, booking
    /// counters, and the derived completion and response rates.
    pub async fn reputation_stats(&self, provider: UserId) -> Result<ReputationStats> {
        let now = self.clock.now();
        let reputation = self.reputation.get(provider, now).await?;
        let counts = self.bookings.counts_for_provider(provider).await?;
        Ok(ReputationStats::compute(
            &reputation,
            counts.total,
            counts.completed,
            counts.cancelled,
            counts.auto_rejected,
        ))
    }

    /// Expires one booking. Returns `Ok(false)` if the provider's answer
    /// won the race.
    async fn expire_one(
        &self,
        booking: &Booking,
        now: DateTime<Utc>,
        sink: &mut dyn EventSink,
    ) -> Result<bool> {
        let command = TransitionCommand::AutoReject {
            reason: format!(
                "provider did not respond within {} minutes",
                self.config.response_window.num_minutes()
            ),
        };

        let updated = match self
            .bookings
            .apply_transition(booking.id, BookingStatus::Pending, &command, now)
            .await?
        {
            CasOutcome::Applied(updated) => updated,
            CasOutcome::NotFound | CasOutcome::StatusMismatch { .. } => {
                tracing::debug!(booking_id = %booking.id, "booking answered before expiry, skipping");
                return Ok(false);
            }
        };

        self.metrics.record_expired();
        self.metrics.record_transition(
            BookingStatus::Pending,
            BookingStatus::Rejected,
            command.reason(),
        );

        let adjustment = self
            .reputation
            .penalize(updated.provider_id, self.config.timeout_penalty, now)
            .await?;
        self.metrics.record_rating_penalty();

        tracing::warn!(
            booking_id = %updated.id,
            provider_id = %updated.provider_id,
            old_rating = adjustment.old_rating,
            new_rating = adjustment.new_rating,
            "booking expired unanswered"
        );

        sink.push(NotificationEvent::booking_expired(&updated, now));
        sink.push(NotificationEvent::reputation_changed(
            updated.provider_id,
            adjustment.old_rating,
            adjustment.new_rating,
            "missed response deadline",
            Some(updated.id),
            now,
        ));

        Ok(true)
    }
}

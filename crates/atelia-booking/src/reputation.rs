//! Provider reputation scores and derived statistics.
//!
//! Each provider carries a bounded rating in `[0, 100]`. Unanswered
//! booking requests cost points; sustained activity can earn them back.
//! Adjustments saturate at the bounds and never wrap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelia_core::UserId;

/// Lower bound of a provider rating.
pub const MIN_RATING: u32 = 0;
/// Upper bound of a provider rating.
pub const MAX_RATING: u32 = 100;
/// Rating assigned when a provider is first seen.
pub const DEFAULT_RATING: u32 = 100;

/// Reputation record for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReputation {
    /// The provider this record belongs to.
    pub provider_id: UserId,
    /// Current rating, always within `[0, 100]`.
    pub rating: u32,
    /// Number of bookings this provider let expire unanswered.
    pub response_timeout_count: u32,
    /// When the provider last answered a booking request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
    /// When this record last changed.
    pub updated_at: DateTime<Utc>,
}

impl ProviderReputation {
    /// Creates a fresh record at the default rating.
    #[must_use]
    pub fn new(provider_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            provider_id,
            rating: DEFAULT_RATING,
            response_timeout_count: 0,
            last_response_at: None,
            updated_at: now,
        }
    }

    /// Deducts points, saturating at [`MIN_RATING`], and counts the
    /// missed response.
    pub fn penalize(&mut self, points: u32, now: DateTime<Utc>) -> RatingAdjustment {
        let old_rating = self.rating;
        self.rating = self.rating.saturating_sub(points).max(MIN_RATING);
        self.response_timeout_count += 1;
        self.updated_at = now;
        RatingAdjustment {
            provider_id: self.provider_id,
            old_rating,
            new_rating: self.rating,
        }
    }

    /// Adds points, saturating at [`MAX_RATING`].
    pub fn reward(&mut self, points: u32, now: DateTime<Utc>) -> RatingAdjustment {
        let old_rating = self.rating;
        self.rating = self.rating.saturating_add(points).min(MAX_RATING);
        self.updated_at = now;
        RatingAdjustment {
            provider_id: self.provider_id,
            old_rating,
            new_rating: self.rating,
        }
    }

    /// Records that the provider answered a booking request.
    pub fn touch_response(&mut self, now: DateTime<Utc>) {
        self.last_response_at = Some(now);
        self.updated_at = now;
    }
}

/// The outcome of a rating change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingAdjustment {
    /// The affected provider.
    pub provider_id: UserId,
    /// Rating before the change.
    pub old_rating: u32,
    /// Rating after the change, within `[0, 100]`.
    pub new_rating: u32,
}

impl RatingAdjustment {
    /// Returns true if the rating actually moved.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.old_rating != self.new_rating
    }
}

/// Aggregated provider statistics derived from bookings and reputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReputationStats {
    /// The provider these statistics describe.
    pub provider_id: UserId,
    /// Current rating.
    pub rating: u32,
    /// Total bookings addressed to this provider.
    pub total_bookings: u64,
    /// Bookings that reached COMPLETED.
    pub completed_bookings: u64,
    /// Bookings that reached CANCELLED.
    pub cancelled_bookings: u64,
    /// Bookings the watchdog rejected on deadline expiry.
    pub auto_rejected_bookings: u64,
    /// Bookings this provider let expire unanswered (lifetime counter).
    pub response_timeout_count: u32,
    /// When the provider last answered a booking request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response_at: Option<DateTime<Utc>>,
    /// Fraction of bookings completed, rounded to two decimals.
    pub completion_rate: f64,
    /// Fraction of bookings answered before the deadline, rounded to two
    /// decimals.
    pub response_rate: f64,
}

impl ReputationStats {
    /// Computes the derived rates from raw counters.
    ///
    /// A provider with no bookings has a completion rate of 0 and a
    /// response rate of 1: no request has gone unanswered yet.
    #[must_use]
    pub fn compute(
        reputation: &ProviderReputation,
        total: u64,
        completed: u64,
        cancelled: u64,
        auto_rejected: u64,
    ) -> Self {
        let (completion_rate, response_rate) = if total == 0 {
            (0.0, 1.0)
        } else {
            #[allow(clippy::cast_precision_loss)]
            let completion = completed as f64 / total as f64;
            #[allow(clippy::cast_precision_loss)]
            let response = 1.0 - auto_rejected as f64 / total as f64;
            (round2(completion), round2(response))
        };

        Self {
            provider_id: reputation.provider_id,
            rating: reputation.rating,
            total_bookings: total,
            completed_bookings: completed,
            cancelled_bookings: cancelled,
            auto_rejected_bookings: auto_rejected,
            response_timeout_count: reputation.response_timeout_count,
            last_response_at: reputation.last_response_at,
            completion_rate,
            response_rate,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

//! Pluggable storage for bookings and provider reputation.
//!
//! ## Design Principles
//!
//! - **CAS semantics**: Status transitions use compare-and-set so that a
//!   provider answering concurrently with the deadline watchdog cannot
//!   both win
//! - **Separation of concerns**: Booking records and reputation records
//!   live behind independent traits
//! - **Testability**: In-memory implementations for testing, a relational
//!   backend for production

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atelia_core::{BookingId, UserId};

use crate::booking::{Booking, BookingStatus, TransitionCommand};
use crate::error::Result;
use crate::reputation::{ProviderReputation, RatingAdjustment};

/// Result of a compare-and-set transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasOutcome {
    /// The transition was applied; the updated record is returned.
    Applied(Box<Booking>),
    /// The booking does not exist.
    NotFound,
    /// The booking's status did not match the expectation.
    StatusMismatch {
        /// The status actually found.
        actual: BookingStatus,
    },
}

impl CasOutcome {
    /// Returns true if the transition was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Largest accepted page size; larger requests are clamped.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Pagination request. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl PageRequest {
    /// First page with the default size of 20.
    #[must_use]
    pub const fn first() -> Self {
        Self { page: 1, limit: 20 }
    }

    /// Clamps the request into valid bounds: page at least 1, limit in
    /// `[1, MAX_PAGE_LIMIT]`.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Returns the number of records to skip.
    #[must_use]
    pub fn offset(&self) -> usize {
        let skip = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit);
        usize::try_from(skip).unwrap_or(usize::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first()
    }
}

/// One page of results with the total count across all pages.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Records on this page.
    pub items: Vec<T>,
    /// Total matching records across all pages.
    pub total: u64,
    /// The request that produced this page.
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Returns the number of pages the total spans at this page size.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        let limit = u64::from(self.request.limit.max(1));
        self.total.div_ceil(limit)
    }
}

/// Per-provider booking counters for statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookingCounts {
    /// All bookings addressed to the provider.
    pub total: u64,
    /// Bookings that reached COMPLETED.
    pub completed: u64,
    /// Bookings that reached CANCELLED.
    pub cancelled: u64,
    /// Bookings the watchdog rejected on deadline expiry.
    pub auto_rejected: u64,
}

/// Storage abstraction for booking records.
///
/// ## CAS Semantics
///
/// `apply_transition` is the core primitive for correctness: the status
/// check, the transition effects, and the write all happen under one
/// atomic update. Read-then-write sequences outside this method race
/// against the watchdog and must not be used for transitions.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Gets a booking by ID.
    ///
    /// Returns `None` if the booking does not exist.
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Inserts a new booking.
    ///
    /// # Errors
    ///
    /// Returns a conflict error if a booking with the same ID exists.
    async fn insert(&self, booking: &Booking) -> Result<()>;

    /// Atomically applies a transition if the current status matches.
    ///
    /// # Returns
    ///
    /// - `CasOutcome::Applied` with the updated record
    /// - `CasOutcome::NotFound` if the booking does not exist
    /// - `CasOutcome::StatusMismatch` if the status changed concurrently
    ///
    /// # Errors
    ///
    /// Returns an error if the command is illegal from the expected
    /// status, or on storage failure.
    async fn apply_transition(
        &self,
        booking_id: BookingId,
        expected_status: BookingStatus,
        command: &TransitionCommand,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome>;

    /// Gets all PENDING bookings whose response deadline elapsed before
    /// `now`.
    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>>;

    /// Lists bookings where the user is the requester or the provider,
    /// optionally filtered by status, newest `scheduled_at` first.
    async fn list_for_actor(
        &self,
        user: UserId,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>>;

    /// Returns booking counters for a provider.
    async fn counts_for_provider(&self, provider: UserId) -> Result<BookingCounts>;

    /// Returns true if the provider has a CONFIRMED booking overlapping
    /// `[start, end)`.
    async fn has_confirmed_overlap(
        &self,
        provider: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Storage abstraction for provider reputation.
///
/// Records are created lazily at the default rating the first time a
/// provider is penalized, rewarded, or read.
#[async_trait]
pub trait ReputationStore: Send + Sync {
    /// Gets (or lazily creates) the provider's reputation record.
    async fn get(&self, provider: UserId, now: DateTime<Utc>) -> Result<ProviderReputation>;

    /// Deducts points and counts the missed response. The rating
    /// saturates at 0.
    async fn penalize(
        &self,
        provider: UserId,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<RatingAdjustment>;

    /// Adds points. The rating saturates at 100.
    async fn reward(
        &self,
        provider: UserId,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<RatingAdjustment>;

    /// Records that the provider answered a booking request.
    async fn touch_response(&self, provider: UserId, now: DateTime<Utc>) -> Result<()>;
}

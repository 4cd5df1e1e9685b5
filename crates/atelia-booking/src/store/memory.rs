//! In-memory store implementations for testing.
//!
//! ## Limitations
//!
//! - **NOT suitable for production**: No durability, no cross-process
//!   coordination
//! - **Single-process only**: State is not shared across process
//!   boundaries

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use atelia_core::{BookingId, UserId};

use super::{BookingCounts, BookingStore, CasOutcome, Page, PageRequest, ReputationStore};
use crate::booking::{Booking, BookingStatus, TransitionCommand};
use crate::error::{Error, Result};
use crate::reputation::{ProviderReputation, RatingAdjustment};

/// Converts a lock poison error to a storage error.
fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

/// In-memory booking store for testing.
///
/// Thread-safe implementation of [`BookingStore`] using `RwLock` for
/// synchronization. The compare-and-set transition holds the write lock
/// across the status check and the mutation, giving the same atomicity a
/// relational backend provides with a conditional `UPDATE`.
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<BookingId, Booking>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bookings currently stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn booking_count(&self) -> Result<usize> {
        let count = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings.len()
        };
        Ok(count)
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        let result = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings.get(&booking_id).cloned()
        };
        Ok(result)
    }

    async fn insert(&self, booking: &Booking) -> Result<()> {
        let mut bookings = self.bookings.write().map_err(poison_err)?;
        if bookings.contains_key(&booking.id) {
            drop(bookings);
            return Err(Error::conflict(format!(
                "booking {} already exists",
                booking.id
            )));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn apply_transition(
        &self,
        booking_id: BookingId,
        expected_status: BookingStatus,
        command: &TransitionCommand,
        now: DateTime<Utc>,
    ) -> Result<CasOutcome> {
        let mut bookings = self.bookings.write().map_err(poison_err)?;

        let Some(booking) = bookings.get_mut(&booking_id) else {
            drop(bookings);
            return Ok(CasOutcome::NotFound);
        };

        if booking.status != expected_status {
            let actual = booking.status;
            drop(bookings);
            return Ok(CasOutcome::StatusMismatch { actual });
        }

        booking.apply(command, now)?;
        let updated = booking.clone();
        drop(bookings);
        Ok(CasOutcome::Applied(Box::new(updated)))
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<Booking>> {
        let mut expired = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings
                .values()
                .filter(|b| b.is_expired(now))
                .cloned()
                .collect::<Vec<_>>()
        };
        expired.sort_by_key(|b| b.response_deadline);
        Ok(expired)
    }

    async fn list_for_actor(
        &self,
        user: UserId,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        let mut matching = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings
                .values()
                .filter(|b| b.requester_id == user || b.provider_id == user)
                .filter(|b| status.is_none_or(|s| b.status == s))
                .cloned()
                .collect::<Vec<_>>()
        };
        matching.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset())
            .take(page.limit as usize)
            .collect();

        Ok(Page {
            items,
            total,
            request: page,
        })
    }

    async fn counts_for_provider(&self, provider: UserId) -> Result<BookingCounts> {
        let counts = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings
                .values()
                .filter(|b| b.provider_id == provider)
                .fold(BookingCounts::default(), |mut counts, b| {
                    counts.total += 1;
                    match b.status {
                        BookingStatus::Completed => counts.completed += 1,
                        BookingStatus::Cancelled => counts.cancelled += 1,
                        BookingStatus::Rejected if b.is_auto_rejected => {
                            counts.auto_rejected += 1;
                        }
                        _ => {}
                    }
                    counts
                })
        };
        Ok(counts)
    }

    async fn has_confirmed_overlap(
        &self,
        provider: UserId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<bool> {
        let overlap = {
            let bookings = self.bookings.read().map_err(poison_err)?;
            bookings.values().any(|b| {
                b.provider_id == provider
                    && b.status == BookingStatus::Confirmed
                    && b.overlaps(start, end)
            })
        };
        Ok(overlap)
    }
}

/// In-memory reputation store for testing.
///
/// Records are created lazily at the default rating on first access.
#[derive(Debug, Default)]
pub struct InMemoryReputationStore {
    records: RwLock<HashMap<UserId, ProviderReputation>>,
}

impl InMemoryReputationStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReputationStore for InMemoryReputationStore {
    async fn get(&self, provider: UserId, now: DateTime<Utc>) -> Result<ProviderReputation> {
        let mut records = self.records.write().map_err(poison_err)?;
        let record = records
            .entry(provider)
            .or_insert_with(|| ProviderReputation::new(provider, now))
            .clone();
        drop(records);
        Ok(record)
    }

    async fn penalize(
        &self,
        provider: UserId,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<RatingAdjustment> {
        let mut records = self.records.write().map_err(poison_err)?;
        let record = records
            .entry(provider)
            .or_insert_with(|| ProviderReputation::new(provider, now));
        let adjustment = record.penalize(points, now);
        drop(records);
        Ok(adjustment)
    }

    async fn reward(
        &self,
        provider: UserId,
        points: u32,
        now: DateTime<Utc>,
    ) -> Result<RatingAdjustment> {
        let mut records = self.records.write().map_err(poison_err)?;
        let record = records
            .entry(provider)
            .or_insert_with(|| ProviderReputation::new(provider, now));
        let adjustment = record.reward(points, now);
        drop(records);
        Ok(adjustment)
    }

    async fn touch_response(&self, provider: UserId, now: DateTime<Utc>) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        let record = records
            .entry(provider)
            .or_insert_with(|| ProviderReputation::new(provider, now));
        record.touch_response(now);
        drop(records);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::CancellerRole;
    use atelia_core::ServiceId;

    fn pending_booking(now: DateTime<Utc>) -> Booking {
        Booking {
            id: BookingId::generate(),
            requester_id: UserId::generate(),
            provider_id: UserId::generate(),
            service_id: ServiceId::generate(),
            scheduled_at: now + chrono::Duration::hours(1),
            duration_minutes: 60,
            price: None,
            status: BookingStatus::Pending,
            response_deadline: now + chrono::Duration::minutes(5),
            is_auto_rejected: false,
            alternative_time_proposed: None,
            cancellation_reason: None,
            confirmed_at: None,
            completed_at: None,
            notes: None,
            created_at: now,
            last_transition_at: None,
            last_transition_reason: None,
        }
    }

    #[tokio::test]
    async fn insert_and_get() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let booking = pending_booking(Utc::now());
        store.insert(&booking).await?;

        let loaded = store.get(booking.id).await?;
        assert_eq!(loaded.map(|b| b.id), Some(booking.id));
        assert_eq!(store.booking_count()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn double_insert_conflicts() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let booking = pending_booking(Utc::now());
        store.insert(&booking).await?;
        assert!(store.insert(&booking).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn cas_applies_once() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();
        let booking = pending_booking(now);
        store.insert(&booking).await?;

        let first = store
            .apply_transition(booking.id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;
        assert!(first.is_applied());

        // Second actor raced and lost: the status is no longer PENDING.
        let second = store
            .apply_transition(
                booking.id,
                BookingStatus::Pending,
                &TransitionCommand::AutoReject {
                    reason: "provider did not respond within 5 minutes".into(),
                },
                now,
            )
            .await?;
        assert_eq!(
            second,
            CasOutcome::StatusMismatch {
                actual: BookingStatus::Confirmed
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn cas_not_found() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let outcome = store
            .apply_transition(
                BookingId::generate(),
                BookingStatus::Pending,
                &TransitionCommand::Confirm,
                Utc::now(),
            )
            .await?;
        assert_eq!(outcome, CasOutcome::NotFound);
        Ok(())
    }

    #[tokio::test]
    async fn expired_pending_excludes_answered() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();

        let expired = pending_booking(now);
        let answered = pending_booking(now);
        let fresh = {
            let mut b = pending_booking(now);
            b.response_deadline = now + chrono::Duration::minutes(30);
            b
        };
        store.insert(&expired).await?;
        store.insert(&answered).await?;
        store.insert(&fresh).await?;

        store
            .apply_transition(answered.id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;

        let later = now + chrono::Duration::minutes(6);
        let found = store.expired_pending(later).await?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, expired.id);
        Ok(())
    }

    #[tokio::test]
    async fn list_orders_newest_first_and_paginates() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();
        let requester = UserId::generate();

        for offset_hours in 1..=5 {
            let mut booking = pending_booking(now);
            booking.requester_id = requester;
            booking.scheduled_at = now + chrono::Duration::hours(offset_hours);
            store.insert(&booking).await?;
        }

        let page = store
            .list_for_actor(requester, None, PageRequest { page: 1, limit: 2 })
            .await?;
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].scheduled_at > page.items[1].scheduled_at);

        let last = store
            .list_for_actor(requester, None, PageRequest { page: 3, limit: 2 })
            .await?;
        assert_eq!(last.items.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn list_filters_by_status() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();
        let requester = UserId::generate();

        let mut confirmed = pending_booking(now);
        confirmed.requester_id = requester;
        store.insert(&confirmed).await?;
        store
            .apply_transition(confirmed.id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;

        let mut pending = pending_booking(now);
        pending.requester_id = requester;
        store.insert(&pending).await?;

        let page = store
            .list_for_actor(requester, Some(BookingStatus::Confirmed), PageRequest::first())
            .await?;
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, confirmed.id);
        Ok(())
    }

    #[tokio::test]
    async fn provider_counts() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();
        let provider = UserId::generate();

        let mut completed = pending_booking(now);
        completed.provider_id = provider;
        store.insert(&completed).await?;
        store
            .apply_transition(completed.id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;
        store
            .apply_transition(
                completed.id,
                BookingStatus::Confirmed,
                &TransitionCommand::Complete,
                now,
            )
            .await?;

        let mut cancelled = pending_booking(now);
        cancelled.provider_id = provider;
        store.insert(&cancelled).await?;
        store
            .apply_transition(
                cancelled.id,
                BookingStatus::Pending,
                &TransitionCommand::Cancel {
                    reason: None,
                    by: CancellerRole::Requester,
                },
                now,
            )
            .await?;

        let mut auto = pending_booking(now);
        auto.provider_id = provider;
        store.insert(&auto).await?;
        store
            .apply_transition(
                auto.id,
                BookingStatus::Pending,
                &TransitionCommand::AutoReject {
                    reason: "provider did not respond within 5 minutes".into(),
                },
                now,
            )
            .await?;

        let counts = store.counts_for_provider(provider).await?;
        assert_eq!(
            counts,
            BookingCounts {
                total: 3,
                completed: 1,
                cancelled: 1,
                auto_rejected: 1,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn confirmed_overlap_detection() -> Result<()> {
        let store = InMemoryBookingStore::new();
        let now = Utc::now();
        let provider = UserId::generate();

        let mut booking = pending_booking(now);
        booking.provider_id = provider;
        store.insert(&booking).await?;

        // Pending bookings do not block the slot.
        assert!(
            !store
                .has_confirmed_overlap(provider, booking.scheduled_at, booking.scheduled_end())
                .await?
        );

        store
            .apply_transition(booking.id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;
        assert!(
            store
                .has_confirmed_overlap(provider, booking.scheduled_at, booking.scheduled_end())
                .await?
        );
        Ok(())
    }

    #[tokio::test]
    async fn reputation_lazy_creation_and_clamping() -> Result<()> {
        let store = InMemoryReputationStore::new();
        let provider = UserId::generate();
        let now = Utc::now();

        let record = store.get(provider, now).await?;
        assert_eq!(record.rating, 100);

        for _ in 0..25 {
            store.penalize(provider, 5, now).await?;
        }
        let floored = store.get(provider, now).await?;
        assert_eq!(floored.rating, 0);
        assert_eq!(floored.response_timeout_count, 25);

        store.reward(provider, 5, now).await?;
        let adjustment = store.reward(provider, 200, now).await?;
        assert_eq!(adjustment.new_rating, 100);
        Ok(())
    }

    #[tokio::test]
    async fn touch_response_records_time() -> Result<()> {
        let store = InMemoryReputationStore::new();
        let provider = UserId::generate();
        let now = Utc::now();

        store.touch_response(provider, now).await?;
        let record = store.get(provider, now).await?;
        assert_eq!(record.last_response_at, Some(now));
        Ok(())
    }
}

//! End-to-end tests for deadline expiry and its race with the
//! provider's answer.

use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use atelia_booking::booking::BookingStatus;
use atelia_booking::clock::{Clock, ManualClock};
use atelia_booking::config::BookingConfig;
use atelia_booking::directory::InMemoryDirectory;
use atelia_booking::error::{Error, Result};
use atelia_booking::events::{NotificationEvent, NotificationType};
use atelia_booking::outbox::{EventSink, InMemoryOutbox};
use atelia_booking::store::memory::{InMemoryBookingStore, InMemoryReputationStore};
use atelia_booking::store::ReputationStore;
use atelia_booking::watchdog::DeadlineWatchdog;
use atelia_booking::workflow::{BookingWorkflow, CreateBooking};
use atelia_core::{ServiceId, UserId};

struct Harness {
    workflow: BookingWorkflow,
    watchdog: DeadlineWatchdog,
    reputation: Arc<InMemoryReputationStore>,
    clock: Arc<ManualClock>,
    requester: UserId,
    provider: UserId,
    service: ServiceId,
}

fn harness() -> Harness {
    let mut directory = InMemoryDirectory::new();
    let requester = directory.add_user("Mira");
    let provider = directory.add_provider("Vera");
    let service = directory.add_service("Gel manicure");
    directory.add_offering(provider, service, Some(60), None);

    let bookings = Arc::new(InMemoryBookingStore::new());
    let reputation = Arc::new(InMemoryReputationStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let config = BookingConfig::default();

    let workflow = BookingWorkflow::new(
        bookings.clone(),
        reputation.clone(),
        Arc::new(directory),
        clock.clone(),
        config.clone(),
    );
    let watchdog = DeadlineWatchdog::new(bookings, reputation.clone(), clock.clone(), config);

    Harness {
        workflow,
        watchdog,
        reputation,
        clock,
        requester,
        provider,
        service,
    }
}

fn request(h: &Harness) -> CreateBooking {
    CreateBooking {
        requester_id: h.requester,
        provider_id: h.provider,
        service_id: h.service,
        scheduled_at: h.clock.now() + Duration::hours(2),
        duration_minutes: None,
        notes: None,
    }
}

#[tokio::test]
async fn unanswered_booking_expires_with_penalty_and_notifications() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    let booking = h.workflow.create(request(&h), &mut outbox).await?;
    outbox.drain();

    h.clock.advance(Duration::minutes(6));
    let summary = h.watchdog.scan_and_expire(&mut outbox).await?;
    assert_eq!(summary.expired, 1);

    let updated = h.workflow.get(booking.id, h.requester).await?;
    assert_eq!(updated.status, BookingStatus::Rejected);
    assert!(updated.is_auto_rejected);
    assert!(
        updated
            .cancellation_reason
            .as_deref()
            .is_some_and(|r| r.contains("did not respond"))
    );

    let events = outbox.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, NotificationType::BookingRejected);
    assert_eq!(events[0].target_user_id, h.requester);
    assert_eq!(events[1].event_type, NotificationType::ReputationChanged);
    assert_eq!(events[1].target_user_id, h.provider);

    let stats = h.watchdog.reputation_stats(h.provider).await?;
    assert_eq!(stats.rating, 95);
    assert_eq!(stats.auto_rejected_bookings, 1);
    assert_eq!(stats.response_timeout_count, 1);
    assert!((stats.response_rate - 0.0).abs() < f64::EPSILON);
    Ok(())
}

#[tokio::test]
async fn late_answer_after_expiry_is_rejected() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    let booking = h.workflow.create(request(&h), &mut outbox).await?;
    h.clock.advance(Duration::minutes(6));
    h.watchdog.scan_and_expire(&mut outbox).await?;

    let err = h
        .workflow
        .confirm(booking.id, h.provider, &mut outbox)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStateTransition { .. }));
    Ok(())
}

#[tokio::test]
async fn answer_between_query_and_scan_wins_the_race() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    let booking = h.workflow.create(request(&h), &mut outbox).await?;
    h.clock.advance(Duration::minutes(6));

    // Past the deadline, but the provider's late answer lands before the
    // watchdog cycle runs. The scan must leave the booking alone.
    h.workflow.confirm(booking.id, h.provider, &mut outbox).await?;
    outbox.drain();

    let summary = h.watchdog.scan_and_expire(&mut outbox).await?;
    assert_eq!(summary.expired, 0);
    assert!(outbox.events().is_empty());

    let updated = h.workflow.get(booking.id, h.requester).await?;
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert!(!updated.is_auto_rejected);

    let stats = h.watchdog.reputation_stats(h.provider).await?;
    assert_eq!(stats.rating, 100);
    Ok(())
}

#[tokio::test]
async fn repeated_scans_are_idempotent() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    h.workflow.create(request(&h), &mut outbox).await?;
    outbox.drain();
    h.clock.advance(Duration::minutes(6));

    h.watchdog.scan_and_expire(&mut outbox).await?;
    let second = h.watchdog.scan_and_expire(&mut outbox).await?;
    let third = h.watchdog.scan_and_expire(&mut outbox).await?;
    assert_eq!(second.expired + third.expired, 0);

    // One penalty, one pair of notifications.
    assert_eq!(outbox.events().len(), 2);
    let stats = h.watchdog.reputation_stats(h.provider).await?;
    assert_eq!(stats.rating, 95);
    assert_eq!(stats.response_timeout_count, 1);
    Ok(())
}

#[tokio::test]
async fn rating_saturates_at_both_bounds() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    // Drive the rating down to 2, then one more penalty clamps at 0.
    let now = h.clock.now();
    h.reputation.penalize(h.provider, 98, now).await?;
    h.workflow.create(request(&h), &mut outbox).await?;
    h.clock.advance(Duration::minutes(6));
    h.watchdog.scan_and_expire(&mut outbox).await?;

    let record = h.reputation.get(h.provider, h.clock.now()).await?;
    assert_eq!(record.rating, 0);

    // Rewards saturate at 100 the same way.
    let other = UserId::generate();
    h.reputation.reward(other, 3, now).await?;
    let adjustment = h.reputation.reward(other, 5, now).await?;
    assert_eq!(adjustment.new_rating, 100);
    Ok(())
}

#[tokio::test]
async fn terminal_bookings_are_never_rescanned() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    let cancelled = h.workflow.create(request(&h), &mut outbox).await?;
    h.workflow
        .cancel(cancelled.id, h.requester, None, &mut outbox)
        .await?;

    let completed = h.workflow.create(request(&h), &mut outbox).await?;
    h.workflow.confirm(completed.id, h.provider, &mut outbox).await?;
    h.workflow.complete(completed.id, h.provider).await?;

    h.clock.advance(Duration::minutes(10));
    outbox.drain();
    let summary = h.watchdog.scan_and_expire(&mut outbox).await?;
    assert_eq!(summary.scanned, 0);
    assert!(outbox.events().is_empty());

    assert_eq!(
        h.workflow.get(cancelled.id, h.requester).await?.status,
        BookingStatus::Cancelled
    );
    assert_eq!(
        h.workflow.get(completed.id, h.requester).await?.status,
        BookingStatus::Completed
    );
    Ok(())
}

/// Sink that can be shared with a spawned watchdog task.
#[derive(Clone, Default)]
struct SharedOutbox {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl EventSink for SharedOutbox {
    fn push(&mut self, event: NotificationEvent) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(event);
    }
}

#[tokio::test(start_paused = true)]
async fn run_loop_scans_on_interval_and_honors_shutdown() -> Result<()> {
    let h = harness();
    let mut outbox = InMemoryOutbox::new();

    h.workflow.create(request(&h), &mut outbox).await?;
    h.clock.advance(Duration::minutes(6));

    let sink = SharedOutbox::default();
    let events = sink.events.clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let watchdog = Arc::new(h.watchdog);
    let runner = watchdog.clone();
    let handle = tokio::spawn(async move {
        runner.run(Box::new(sink), shutdown_rx).await;
    });

    // Let the spawned task register its interval before moving time.
    tokio::task::yield_now().await;

    // Paused time: advancing past one interval triggers exactly one scan.
    tokio::time::advance(std::time::Duration::from_secs(61)).await;
    tokio::task::yield_now().await;

    shutdown_tx.send(true).expect("watchdog is listening");
    handle.await.expect("watchdog task completes");

    let collected = events
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    assert_eq!(collected.len(), 2);
    assert_eq!(collected[0].event_type, NotificationType::BookingRejected);
    Ok(())
}

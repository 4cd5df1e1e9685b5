//! Notification events emitted by booking transitions.
//!
//! Every state transition (except completion, which is an internal
//! bookkeeping step) emits one event per affected party. Events carry a
//! stable type, a human-readable title and message, and a structured
//! payload for downstream delivery channels.
//!
//! ## Idempotency
//!
//! Events carry an `idempotency_key` derived from the booking identity
//! and event type, so a downstream consumer can deduplicate redeliveries.
//! Watchdog expiry events in particular may be re-emitted if a process
//! crashes between the store update and event publication; the key makes
//! the duplicate detectable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use atelia_core::{BookingId, EventId, UserId};

use crate::booking::Booking;

/// Stable notification event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A new booking request awaits the provider's answer.
    BookingRequest,
    /// The provider confirmed the booking.
    BookingConfirmed,
    /// The booking was rejected, manually or by deadline expiry.
    BookingRejected,
    /// The provider proposed an alternative time.
    BookingRescheduled,
    /// The booking was cancelled.
    BookingCancelled,
    /// A provider's reputation score changed.
    ReputationChanged,
}

impl NotificationType {
    /// Returns the event name (`snake_case`) for the wire type field.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::BookingRequest => "booking_request",
            Self::BookingConfirmed => "booking_confirmed",
            Self::BookingRejected => "booking_rejected",
            Self::BookingRescheduled => "booking_rescheduled",
            Self::BookingCancelled => "booking_cancelled",
            Self::ReputationChanged => "reputation_changed",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.event_name())
    }
}

/// A notification addressed to one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Unique event identifier (ULID).
    pub id: EventId,
    /// The user this notification is addressed to.
    pub target_user_id: UserId,
    /// Event type.
    pub event_type: NotificationType,
    /// Short human-readable title.
    pub title: String,
    /// Human-readable message body.
    pub message: String,
    /// Structured payload for delivery channels.
    pub data: serde_json::Value,
    /// Deduplication key, deterministic per logical event.
    pub idempotency_key: String,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Creates a new event with a generated ID.
    #[must_use]
    pub fn new(
        target_user_id: UserId,
        event_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        data: serde_json::Value,
        idempotency_key: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(),
            target_user_id,
            event_type,
            title: title.into(),
            message: message.into(),
            data,
            idempotency_key: idempotency_key.into(),
            created_at,
        }
    }

    fn booking_payload(booking: &Booking) -> serde_json::Value {
        serde_json::json!({
            "bookingId": booking.id,
            "requesterId": booking.requester_id,
            "providerId": booking.provider_id,
            "serviceId": booking.service_id,
            "scheduledAt": booking.scheduled_at,
            "status": booking.status,
        })
    }

    fn dedup_key(booking_id: BookingId, event_type: NotificationType, target: UserId) -> String {
        format!("{}:{booking_id}:{target}", event_type.event_name())
    }

    /// Event for the provider: a new request awaits their answer.
    #[must_use]
    pub fn booking_requested(booking: &Booking, requester_name: &str) -> Self {
        let window_minutes = (booking.response_deadline - booking.created_at).num_minutes();
        Self::new(
            booking.provider_id,
            NotificationType::BookingRequest,
            "New booking request",
            format!(
                "{requester_name} requested a booking for {}. Respond within {window_minutes} minutes.",
                booking.scheduled_at.format("%Y-%m-%d %H:%M")
            ),
            Self::booking_payload(booking),
            Self::dedup_key(booking.id, NotificationType::BookingRequest, booking.provider_id),
            booking.created_at,
        )
    }

    /// Event for the requester: the provider confirmed.
    #[must_use]
    pub fn booking_confirmed(booking: &Booking, provider_name: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            booking.requester_id,
            NotificationType::BookingConfirmed,
            "Booking confirmed",
            format!(
                "{provider_name} confirmed your booking for {}.",
                booking.scheduled_at.format("%Y-%m-%d %H:%M")
            ),
            Self::booking_payload(booking),
            Self::dedup_key(booking.id, NotificationType::BookingConfirmed, booking.requester_id),
            now,
        )
    }

    /// Event for the requester: the provider declined.
    #[must_use]
    pub fn booking_rejected(booking: &Booking, provider_name: &str, now: DateTime<Utc>) -> Self {
        let mut data = Self::booking_payload(booking);
        if let Some(reason) = &booking.cancellation_reason {
            data["reason"] = serde_json::Value::String(reason.clone());
        }
        Self::new(
            booking.requester_id,
            NotificationType::BookingRejected,
            "Booking rejected",
            format!("{provider_name} declined your booking request."),
            data,
            Self::dedup_key(booking.id, NotificationType::BookingRejected, booking.requester_id),
            now,
        )
    }

    /// Event for the requester: the request expired unanswered.
    #[must_use]
    pub fn booking_expired(booking: &Booking, now: DateTime<Utc>) -> Self {
        Self::new(
            booking.requester_id,
            NotificationType::BookingRejected,
            "Booking request expired",
            "The provider did not respond in time. Your request was automatically declined."
                .to_string(),
            Self::booking_payload(booking),
            Self::dedup_key(booking.id, NotificationType::BookingRejected, booking.requester_id),
            now,
        )
    }

    /// Event for the requester: the provider proposed a different time.
    #[must_use]
    pub fn booking_rescheduled(
        booking: &Booking,
        provider_name: &str,
        alternative_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut data = Self::booking_payload(booking);
        data["alternativeTime"] =
            serde_json::to_value(alternative_time).unwrap_or(serde_json::Value::Null);
        Self::new(
            booking.requester_id,
            NotificationType::BookingRescheduled,
            "Alternative time proposed",
            format!(
                "{provider_name} proposed {} instead.",
                alternative_time.format("%Y-%m-%d %H:%M")
            ),
            data,
            Self::dedup_key(booking.id, NotificationType::BookingRescheduled, booking.requester_id),
            now,
        )
    }

    /// Event for the counterparty (or both parties): the booking was
    /// cancelled.
    #[must_use]
    pub fn booking_cancelled(
        booking: &Booking,
        target: UserId,
        canceller_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut data = Self::booking_payload(booking);
        data["cancellerName"] = serde_json::Value::String(canceller_name.to_string());
        if let Some(reason) = &booking.cancellation_reason {
            data["reason"] = serde_json::Value::String(reason.clone());
        }
        Self::new(
            target,
            NotificationType::BookingCancelled,
            "Booking cancelled",
            format!(
                "{canceller_name} cancelled the booking for {}.",
                booking.scheduled_at.format("%Y-%m-%d %H:%M")
            ),
            data,
            Self::dedup_key(booking.id, NotificationType::BookingCancelled, target),
            now,
        )
    }

    /// Event for the provider: their rating changed.
    #[must_use]
    pub fn reputation_changed(
        provider_id: UserId,
        old_rating: u32,
        new_rating: u32,
        reason: &str,
        booking_id: Option<BookingId>,
        now: DateTime<Utc>,
    ) -> Self {
        let data = serde_json::json!({
            "providerId": provider_id,
            "oldRating": old_rating,
            "newRating": new_rating,
            "reason": reason,
            "bookingId": booking_id,
        });
        let idempotency_key = match booking_id {
            Some(id) => format!("reputation_changed:{id}:{provider_id}"),
            None => format!("reputation_changed:{provider_id}:{}", now.timestamp_millis()),
        };
        Self::new(
            provider_id,
            NotificationType::ReputationChanged,
            "Rating updated",
            format!("Your rating changed from {old_rating} to {new_rating}: {reason}"),
            data,
            idempotency_key,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelia_core::ServiceId;
    use crate::booking::BookingStatus;

    fn sample_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: BookingId::generate(),
            requester_id: UserId::generate(),
            provider_id: UserId::generate(),
            service_id: ServiceId::generate(),
            scheduled_at: now + chrono::Duration::hours(2),
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

    #[test]
    fn request_event_targets_provider() {
        let booking = sample_booking();
        let event = NotificationEvent::booking_requested(&booking, "Mira");
        assert_eq!(event.target_user_id, booking.provider_id);
        assert_eq!(event.event_type, NotificationType::BookingRequest);
        assert!(event.message.contains("Mira"));
        assert_eq!(event.data["bookingId"], serde_json::json!(booking.id));
    }

    #[test]
    fn request_event_states_the_configured_window() {
        let mut booking = sample_booking();
        booking.response_deadline = booking.created_at + chrono::Duration::minutes(10);
        let event = NotificationEvent::booking_requested(&booking, "Mira");
        assert!(event.message.contains("Respond within 10 minutes."));
    }

    #[test]
    fn confirmed_event_targets_requester() {
        let booking = sample_booking();
        let event = NotificationEvent::booking_confirmed(&booking, "Vera", Utc::now());
        assert_eq!(event.target_user_id, booking.requester_id);
        assert_eq!(event.event_type, NotificationType::BookingConfirmed);
    }

    #[test]
    fn rejected_event_carries_reason() {
        let mut booking = sample_booking();
        booking.cancellation_reason = Some("fully booked".into());
        let event = NotificationEvent::booking_rejected(&booking, "Vera", Utc::now());
        assert_eq!(event.data["reason"], serde_json::json!("fully booked"));
    }

    #[test]
    fn cancelled_event_names_the_canceller() {
        let mut booking = sample_booking();
        booking.cancellation_reason = Some("illness".into());
        let event = NotificationEvent::booking_cancelled(
            &booking,
            booking.requester_id,
            "Vera",
            Utc::now(),
        );
        assert_eq!(event.target_user_id, booking.requester_id);
        assert!(event.message.contains("Vera"));
        assert_eq!(event.data["cancellerName"], serde_json::json!("Vera"));
        assert_eq!(event.data["reason"], serde_json::json!("illness"));
    }

    #[test]
    fn expiry_event_reuses_rejected_type() {
        let booking = sample_booking();
        let event = NotificationEvent::booking_expired(&booking, Utc::now());
        assert_eq!(event.event_type, NotificationType::BookingRejected);
        assert_eq!(event.target_user_id, booking.requester_id);
    }

    #[test]
    fn idempotency_key_is_deterministic() {
        let booking = sample_booking();
        let now = Utc::now();
        let first = NotificationEvent::booking_confirmed(&booking, "Vera", now);
        let second = NotificationEvent::booking_confirmed(&booking, "Vera", now);
        assert_eq!(first.idempotency_key, second.idempotency_key);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn reputation_event_shows_delta() {
        let provider = UserId::generate();
        let event = NotificationEvent::reputation_changed(
            provider,
            100,
            95,
            "missed response deadline",
            Some(BookingId::generate()),
            Utc::now(),
        );
        assert_eq!(event.target_user_id, provider);
        assert_eq!(event.data["oldRating"], serde_json::json!(100));
        assert_eq!(event.data["newRating"], serde_json::json!(95));
    }

    #[test]
    fn event_serializes_camel_case() -> serde_json::Result<()> {
        let booking = sample_booking();
        let event = NotificationEvent::booking_requested(&booking, "Mira");
        let json = serde_json::to_string(&event)?;
        assert!(json.contains("\"targetUserId\""));
        assert!(json.contains("\"eventType\":\"booking_request\""));
        Ok(())
    }
}

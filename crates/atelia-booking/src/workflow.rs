//! Booking workflow controller.
//!
//! All booking mutations flow through [`BookingWorkflow`]: creation,
//! the provider's answer (confirm, reject, or counter-propose), cancel,
//! and complete. Each operation validates input, authorizes the acting
//! user, applies the transition through the store's compare-and-set
//! primitive, and emits notification events into the caller's sink.
//!
//! The controller itself holds no booking state; given the same store
//! contents and clock it behaves deterministically, which keeps every
//! race (provider answer vs. watchdog expiry) inside the store's atomic
//! transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use atelia_core::{BookingId, ServiceId, UserId};

use crate::booking::{Booking, BookingStatus, CancellerRole, TransitionCommand};
use crate::clock::Clock;
use crate::config::BookingConfig;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::events::NotificationEvent;
use crate::metrics::BookingMetrics;
use crate::outbox::EventSink;
use crate::store::{BookingStore, CasOutcome, Page, PageRequest, ReputationStore};

/// Fallback duration when neither the request nor the offering carries
/// a usable one.
const DEFAULT_DURATION_MINUTES: u32 = 60;

/// A request to create a booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The user requesting the service.
    pub requester_id: UserId,
    /// The provider being booked.
    pub provider_id: UserId,
    /// The catalog service being booked.
    pub service_id: ServiceId,
    /// Requested slot start. Must be strictly in the future.
    pub scheduled_at: DateTime<Utc>,
    /// Requested duration; falls back to the offering's advertised
    /// duration when absent.
    pub duration_minutes: Option<u32>,
    /// Free text for the provider.
    pub notes: Option<String>,
}

/// The booking workflow controller.
pub struct BookingWorkflow {
    bookings: Arc<dyn BookingStore>,
    reputation: Arc<dyn ReputationStore>,
    directory: Arc<dyn Directory>,
    clock: Arc<dyn Clock>,
    config: BookingConfig,
    metrics: BookingMetrics,
}

impl BookingWorkflow {
    /// Creates a new workflow controller.
    #[must_use]
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        reputation: Arc<dyn ReputationStore>,
        directory: Arc<dyn Directory>,
        clock: Arc<dyn Clock>,
        config: BookingConfig,
    ) -> Self {
        Self {
            bookings,
            reputation,
            directory,
            clock,
            config,
            metrics: BookingMetrics::new(),
        }
    }

    /// Creates a new PENDING booking and notifies the provider.
    ///
    /// The response deadline is fixed at creation time plus the
    /// configured response window and never moves afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if the slot is not in the future or the
    ///   duration is zero
    /// - [`Error::ResourceNotFound`] if the requester, provider, or
    ///   service does not exist
    /// - [`Error::Conflict`] if the provider does not offer the service,
    ///   or (when configured) the slot collides with a confirmed booking
    #[tracing::instrument(skip(self, request, sink), fields(
        requester_id = %request.requester_id,
        provider_id = %request.provider_id,
        service_id = %request.service_id,
    ))]
    pub async fn create(
        &self,
        request: CreateBooking,
        sink: &mut dyn EventSink,
    ) -> Result<Booking> {
        let now = self.clock.now();

        if request.scheduled_at <= now {
            return Err(Error::validation("scheduled_at must be in the future"));
        }
        if request.duration_minutes == Some(0) {
            return Err(Error::validation("duration_minutes must be positive"));
        }

        if !self.directory.user_exists(request.requester_id).await? {
            return Err(Error::ResourceNotFound {
                resource: "requester",
                id: request.requester_id.to_string(),
            });
        }
        if !self.directory.provider_exists(request.provider_id).await? {
            return Err(Error::ResourceNotFound {
                resource: "provider",
                id: request.provider_id.to_string(),
            });
        }
        if !self.directory.service_exists(request.service_id).await? {
            return Err(Error::ResourceNotFound {
                resource: "service",
                id: request.service_id.to_string(),
            });
        }

        let Some(offering) = self
            .directory
            .offering(request.provider_id, request.service_id)
            .await?
        else {
            return Err(Error::conflict("provider does not offer this service"));
        };

        let duration_minutes = match request.duration_minutes {
            Some(minutes) => minutes,
            None => offering
                .duration_minutes
                .filter(|minutes| *minutes > 0)
                .unwrap_or(DEFAULT_DURATION_MINUTES),
        };

        if self.config.reject_schedule_conflicts {
            let end =
                request.scheduled_at + chrono::Duration::minutes(i64::from(duration_minutes));
            if self
                .bookings
                .has_confirmed_overlap(request.provider_id, request.scheduled_at, end)
                .await?
            {
                return Err(Error::conflict(
                    "provider already has a confirmed booking in this slot",
                ));
            }
        }

        let booking = Booking {
            id: BookingId::generate(),
            requester_id: request.requester_id,
            provider_id: request.provider_id,
            service_id: request.service_id,
            scheduled_at: request.scheduled_at,
            duration_minutes,
            price: offering.price,
            status: BookingStatus::Pending,
            response_deadline: now + self.config.response_window,
            is_auto_rejected: false,
            alternative_time_proposed: None,
            cancellation_reason: None,
            confirmed_at: None,
            completed_at: None,
            notes: request.notes,
            created_at: now,
            last_transition_at: None,
            last_transition_reason: None,
        };

        self.bookings.insert(&booking).await?;
        self.metrics.record_created();
        tracing::info!(booking_id = %booking.id, deadline = %booking.response_deadline, "booking created");

        let requester_name = self
            .directory
            .display_name(booking.requester_id)
            .await?
            .unwrap_or_else(|| "A client".to_string());
        sink.push(NotificationEvent::booking_requested(&booking, &requester_name));

        Ok(booking)
    }

    /// Confirms a PENDING booking. Provider only.
    ///
    /// # Errors
    ///
    /// - [`Error::BookingNotFound`] if the booking does not exist
    /// - [`Error::Unauthorized`] if the actor is not the provider
    /// - [`Error::InvalidStateTransition`] if the booking is no longer
    ///   PENDING, including when the deadline beat the provider to it
    #[tracing::instrument(skip(self, sink), fields(booking_id = %booking_id, actor = %actor))]
    pub async fn confirm(
        &self,
        booking_id: BookingId,
        actor: UserId,
        sink: &mut dyn EventSink,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if actor != booking.provider_id {
            return Err(Error::Unauthorized {
                actor,
                action: "confirm",
            });
        }

        let now = self.clock.now();
        let updated = self
            .transition(booking_id, BookingStatus::Pending, &TransitionCommand::Confirm, now)
            .await?;

        self.reputation.touch_response(updated.provider_id, now).await?;
        tracing::info!("booking confirmed");

        let provider_name = self.provider_name(updated.provider_id).await?;
        sink.push(NotificationEvent::booking_confirmed(&updated, &provider_name, now));

        Ok(updated)
    }

    /// Rejects a PENDING booking or, if `alternative_time` is given,
    /// counter-proposes that time while the booking stays PENDING.
    /// Provider only.
    ///
    /// # Errors
    ///
    /// - [`Error::BookingNotFound`] if the booking does not exist
    /// - [`Error::Unauthorized`] if the actor is not the provider
    /// - [`Error::InvalidStateTransition`] if the booking is no longer
    ///   PENDING
    #[tracing::instrument(skip(self, reason, sink), fields(booking_id = %booking_id, actor = %actor))]
    pub async fn reject(
        &self,
        booking_id: BookingId,
        actor: UserId,
        reason: Option<String>,
        alternative_time: Option<DateTime<Utc>>,
        sink: &mut dyn EventSink,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if actor != booking.provider_id {
            return Err(Error::Unauthorized {
                actor,
                action: "reject",
            });
        }

        let now = self.clock.now();
        let provider_name = self.provider_name(booking.provider_id).await?;

        let updated = if let Some(alternative_time) = alternative_time {
            let updated = self
                .transition(
                    booking_id,
                    BookingStatus::Pending,
                    &TransitionCommand::ProposeAlternative { alternative_time },
                    now,
                )
                .await?;
            tracing::info!(%alternative_time, "alternative time proposed");
            sink.push(NotificationEvent::booking_rescheduled(
                &updated,
                &provider_name,
                alternative_time,
                now,
            ));
            updated
        } else {
            let updated = self
                .transition(
                    booking_id,
                    BookingStatus::Pending,
                    &TransitionCommand::Reject { reason },
                    now,
                )
                .await?;
            tracing::info!("booking rejected");
            sink.push(NotificationEvent::booking_rejected(&updated, &provider_name, now));
            updated
        };

        // Either answer counts as a response for reputation purposes.
        self.reputation.touch_response(booking.provider_id, now).await?;

        Ok(updated)
    }

    /// Cancels a PENDING or CONFIRMED booking.
    ///
    /// The requester, the provider, or an operator may cancel. The
    /// counterparty is notified; an operator cancellation notifies both
    /// parties.
    ///
    /// # Errors
    ///
    /// - [`Error::BookingNotFound`] if the booking does not exist
    /// - [`Error::Unauthorized`] if the actor is none of the three roles
    /// - [`Error::InvalidStateTransition`] if the booking is already
    ///   terminal
    #[tracing::instrument(skip(self, reason, sink), fields(booking_id = %booking_id, actor = %actor))]
    pub async fn cancel(
        &self,
        booking_id: BookingId,
        actor: UserId,
        reason: Option<String>,
        sink: &mut dyn EventSink,
    ) -> Result<Booking> {
        let booking = self.load(booking_id).await?;

        let role = if actor == booking.requester_id {
            CancellerRole::Requester
        } else if actor == booking.provider_id {
            CancellerRole::Provider
        } else if self.directory.is_operator(actor).await? {
            CancellerRole::Operator
        } else {
            return Err(Error::Unauthorized {
                actor,
                action: "cancel",
            });
        };

        let now = self.clock.now();
        let updated = self
            .transition(
                booking_id,
                booking.status,
                &TransitionCommand::Cancel { reason, by: role },
                now,
            )
            .await?;
        tracing::info!(role = ?role, "booking cancelled");

        let canceller_name = self
            .directory
            .display_name(actor)
            .await?
            .unwrap_or_else(|| "A participant".to_string());

        match role {
            CancellerRole::Requester => {
                sink.push(NotificationEvent::booking_cancelled(
                    &updated,
                    updated.provider_id,
                    &canceller_name,
                    now,
                ));
            }
            CancellerRole::Provider => {
                sink.push(NotificationEvent::booking_cancelled(
                    &updated,
                    updated.requester_id,
                    &canceller_name,
                    now,
                ));
            }
            CancellerRole::Operator => {
                sink.push(NotificationEvent::booking_cancelled(
                    &updated,
                    updated.requester_id,
                    &canceller_name,
                    now,
                ));
                sink.push(NotificationEvent::booking_cancelled(
                    &updated,
                    updated.provider_id,
                    &canceller_name,
                    now,
                ));
            }
        }

        Ok(updated)
    }

    /// Marks a CONFIRMED booking as delivered. Provider only.
    ///
    /// Completion is internal bookkeeping and emits no notification.
    ///
    /// # Errors
    ///
    /// - [`Error::BookingNotFound`] if the booking does not exist
    /// - [`Error::Unauthorized`] if the actor is not the provider
    /// - [`Error::InvalidStateTransition`] if the booking is not
    ///   CONFIRMED
    #[tracing::instrument(skip(self), fields(booking_id = %booking_id, actor = %actor))]
    pub async fn complete(&self, booking_id: BookingId, actor: UserId) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        if actor != booking.provider_id {
            return Err(Error::Unauthorized {
                actor,
                action: "complete",
            });
        }

        let now = self.clock.now();
        let updated = self
            .transition(booking_id, BookingStatus::Confirmed, &TransitionCommand::Complete, now)
            .await?;
        tracing::info!("booking completed");
        Ok(updated)
    }

    /// Fetches a booking. Participants and operators only.
    ///
    /// # Errors
    ///
    /// - [`Error::BookingNotFound`] if the booking does not exist
    /// - [`Error::Unauthorized`] if the actor is neither a participant
    ///   nor an operator
    pub async fn get(&self, booking_id: BookingId, actor: UserId) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        let participant = actor == booking.requester_id || actor == booking.provider_id;
        if !participant && !self.directory.is_operator(actor).await? {
            return Err(Error::Unauthorized {
                actor,
                action: "view",
            });
        }
        Ok(booking)
    }

    /// Lists the user's bookings (as requester or provider), optionally
    /// filtered by status, newest `scheduled_at` first. The page request
    /// is clamped into valid bounds.
    pub async fn list(
        &self,
        user: UserId,
        status: Option<BookingStatus>,
        page: PageRequest,
    ) -> Result<Page<Booking>> {
        self.bookings
            .list_for_actor(user, status, page.normalized())
            .await
    }

    async fn load(&self, booking_id: BookingId) -> Result<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or(Error::BookingNotFound { booking_id })
    }

    async fn transition(
        &self,
        booking_id: BookingId,
        expected: BookingStatus,
        command: &TransitionCommand,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        match self
            .bookings
            .apply_transition(booking_id, expected, command, now)
            .await?
        {
            CasOutcome::Applied(updated) => {
                self.metrics
                    .record_transition(expected, updated.status, command.reason());
                Ok(*updated)
            }
            CasOutcome::NotFound => Err(Error::BookingNotFound { booking_id }),
            CasOutcome::StatusMismatch { actual } => Err(Error::InvalidStateTransition {
                from: actual.to_string(),
                to: command.target_status().to_string(),
                reason: "booking status changed concurrently".to_string(),
            }),
        }
    }

    async fn provider_name(&self, provider: UserId) -> Result<String> {
        Ok(self
            .directory
            .display_name(provider)
            .await?
            .unwrap_or_else(|| "The provider".to_string()))
    }
}

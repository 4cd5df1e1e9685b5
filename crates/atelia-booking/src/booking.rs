//! Booking record and lifecycle state machine.
//!
//! This module provides:
//! - `BookingStatus`: The state machine for the reservation lifecycle
//! - `Booking`: The record governing one reservation
//! - `TransitionCommand`: The full effect of a requested transition
//! - `TransitionReason`: Explicit reasons for all state transitions
//!
//! ## State Machine
//!
//! ```text
//! PENDING --confirm--------> CONFIRMED --complete--> COMPLETED
//! PENDING --reject---------> REJECTED
//! PENDING --reschedule-----> PENDING   (alternative_time_proposed set)
//! PENDING|CONFIRMED --cancel--> CANCELLED
//! PENDING --deadline-------> REJECTED  (is_auto_rejected, watchdog-driven)
//! ```
//!
//! REJECTED, CANCELLED, and COMPLETED are terminal: no sequence of
//! operations revisits PENDING from any of them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use atelia_core::{BookingId, ServiceId, UserId};

use crate::error::{Error, Result};

/// Reason for a booking state transition.
///
/// Every transition carries an explicit reason for auditing, metrics, and
/// notification shaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    /// The provider accepted the request.
    ProviderConfirmed,
    /// The provider declined the request.
    ProviderRejected,
    /// The provider proposed a different time; the booking stays PENDING.
    AlternativeTimeProposed,
    /// The response deadline elapsed without a provider answer.
    ResponseDeadlineElapsed,
    /// The requester withdrew the booking.
    RequesterCancelled,
    /// The provider called off the booking.
    ProviderCancelled,
    /// A privileged operator cancelled the booking.
    OperatorCancelled,
    /// The provider marked the service as delivered.
    ServiceCompleted,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ProviderConfirmed => write!(f, "provider_confirmed"),
            Self::ProviderRejected => write!(f, "provider_rejected"),
            Self::AlternativeTimeProposed => write!(f, "alternative_time_proposed"),
            Self::ResponseDeadlineElapsed => write!(f, "response_deadline_elapsed"),
            Self::RequesterCancelled => write!(f, "requester_cancelled"),
            Self::ProviderCancelled => write!(f, "provider_cancelled"),
            Self::OperatorCancelled => write!(f, "operator_cancelled"),
            Self::ServiceCompleted => write!(f, "service_completed"),
        }
    }
}

/// Role of the party cancelling a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellerRole {
    /// The requester who created the booking.
    Requester,
    /// The provider the booking is addressed to.
    Provider,
    /// A privileged operator acting on behalf of the platform.
    Operator,
}

impl CancellerRole {
    /// Returns the transition reason corresponding to this role.
    #[must_use]
    pub const fn transition_reason(self) -> TransitionReason {
        match self {
            Self::Requester => TransitionReason::RequesterCancelled,
            Self::Provider => TransitionReason::ProviderCancelled,
            Self::Operator => TransitionReason::OperatorCancelled,
        }
    }
}

/// Booking lifecycle state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Created, waiting for the provider's answer.
    Pending,
    /// Accepted by the provider.
    Confirmed,
    /// Declined, by the provider or by deadline expiry.
    Rejected,
    /// Called off by either party or an operator.
    Cancelled,
    /// Service delivered.
    Completed,
}

impl BookingStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Cancelled | Self::Completed)
    }

    /// Returns true if the transition from self to target is valid.
    ///
    /// A same-status "transition" (reschedule) is not covered here; see
    /// [`TransitionCommand::ProposeAlternative`].
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        match self {
            Self::Pending => matches!(target, Self::Confirmed | Self::Rejected | Self::Cancelled),
            Self::Confirmed => matches!(target, Self::Completed | Self::Cancelled),
            Self::Rejected | Self::Cancelled | Self::Completed => false,
        }
    }

    /// Returns all valid target states from the current state.
    #[must_use]
    pub fn valid_transitions(&self) -> Vec<Self> {
        match self {
            Self::Pending => vec![Self::Confirmed, Self::Rejected, Self::Cancelled],
            Self::Confirmed => vec![Self::Completed, Self::Cancelled],
            Self::Rejected | Self::Cancelled | Self::Completed => vec![],
        }
    }

    /// Returns a lowercase label suitable for metrics and logs.
    #[must_use]
    pub const fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }
}

impl Default for BookingStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Confirmed => write!(f, "CONFIRMED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// The full effect of a requested booking transition.
///
/// The command bundles the target status with the field mutations that
/// must land in the same atomic update, so a store can apply everything
/// under one compare-and-set on the current status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionCommand {
    /// PENDING -> CONFIRMED; sets `confirmed_at`.
    Confirm,
    /// PENDING -> REJECTED by explicit provider action.
    Reject {
        /// Optional free-text reason, stored as `cancellation_reason`.
        reason: Option<String>,
    },
    /// PENDING -> REJECTED by deadline expiry; sets `is_auto_rejected`.
    AutoReject {
        /// System-generated reason, stored as `cancellation_reason`.
        reason: String,
    },
    /// PENDING -> PENDING; records the provider's counter-proposal.
    ProposeAlternative {
        /// The proposed replacement time.
        alternative_time: DateTime<Utc>,
    },
    /// PENDING|CONFIRMED -> CANCELLED.
    Cancel {
        /// Optional free-text reason, stored as `cancellation_reason`.
        reason: Option<String>,
        /// Who initiated the cancellation.
        by: CancellerRole,
    },
    /// CONFIRMED -> COMPLETED; sets `completed_at`.
    Complete,
}

impl TransitionCommand {
    /// Returns the status this command drives the booking to.
    #[must_use]
    pub const fn target_status(&self) -> BookingStatus {
        match self {
            Self::Confirm => BookingStatus::Confirmed,
            Self::Reject { .. } | Self::AutoReject { .. } => BookingStatus::Rejected,
            Self::ProposeAlternative { .. } => BookingStatus::Pending,
            Self::Cancel { .. } => BookingStatus::Cancelled,
            Self::Complete => BookingStatus::Completed,
        }
    }

    /// Returns the transition reason recorded for this command.
    #[must_use]
    pub const fn reason(&self) -> TransitionReason {
        match self {
            Self::Confirm => TransitionReason::ProviderConfirmed,
            Self::Reject { .. } => TransitionReason::ProviderRejected,
            Self::AutoReject { .. } => TransitionReason::ResponseDeadlineElapsed,
            Self::ProposeAlternative { .. } => TransitionReason::AlternativeTimeProposed,
            Self::Cancel { by, .. } => by.transition_reason(),
            Self::Complete => TransitionReason::ServiceCompleted,
        }
    }
}

/// The record governing one scheduled service between a requester and a
/// provider.
///
/// Bookings are created by a requester action and mutated only by the
/// workflow controller or the deadline watchdog. They are never deleted;
/// terminal states are retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Unique identifier.
    pub id: BookingId,
    /// The party who initiated the reservation. Immutable after creation.
    pub requester_id: UserId,
    /// The party who must answer the reservation. Immutable after creation.
    pub provider_id: UserId,
    /// The catalog item being booked. Opaque to this core.
    pub service_id: ServiceId,
    /// When the service is to occur. Strictly in the future at creation.
    pub scheduled_at: DateTime<Utc>,
    /// Service duration in minutes. Always positive.
    pub duration_minutes: u32,
    /// Price captured from the catalog offering at creation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// Deadline for the provider's answer. Set exactly once at creation
    /// (creation time + response window) and never cleared.
    pub response_deadline: DateTime<Utc>,
    /// True only when the watchdog rejected the booking on deadline
    /// expiry. Never reverts. Implies `status == REJECTED`.
    pub is_auto_rejected: bool,
    /// Counter-proposed time from the provider while still PENDING.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternative_time_proposed: Option<DateTime<Utc>>,
    /// Free-text reason recorded on rejection or cancellation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    /// Set iff the booking is or was CONFIRMED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Set iff the booking is COMPLETED.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Free text from the requester. Immutable after creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the most recent applied transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_at: Option<DateTime<Utc>>,
    /// Reason of the most recent applied transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_reason: Option<TransitionReason>,
}

impl Booking {
    /// Applies a transition command, mutating the record in place.
    ///
    /// Validates the transition against the state machine first; on
    /// failure the record is unchanged. Callers that need atomicity
    /// against concurrent actors must invoke this through the store's
    /// compare-and-set operation rather than directly.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStateTransition`] if the command is not
    /// legal from the current status.
    pub fn apply(&mut self, command: &TransitionCommand, now: DateTime<Utc>) -> Result<()> {
        let target = command.target_status();

        match command {
            TransitionCommand::ProposeAlternative { alternative_time } => {
                // Reschedule is a self-loop: only legal while PENDING.
                if self.status != BookingStatus::Pending {
                    return Err(self.transition_error(target, "booking already answered"));
                }
                self.alternative_time_proposed = Some(*alternative_time);
            }
            _ if !self.status.can_transition_to(target) => {
                let why = if self.status.is_terminal() {
                    "booking is in a terminal state"
                } else {
                    "transition not allowed by the state machine"
                };
                return Err(self.transition_error(target, why));
            }
            TransitionCommand::Confirm => {
                self.status = BookingStatus::Confirmed;
                self.confirmed_at = Some(now);
            }
            TransitionCommand::Reject { reason } => {
                self.status = BookingStatus::Rejected;
                self.cancellation_reason.clone_from(reason);
            }
            TransitionCommand::AutoReject { reason } => {
                // The guard makes a double scan of the same record a no-op
                // at the domain layer as well as at the store layer.
                if self.is_auto_rejected {
                    return Err(self.transition_error(target, "booking already auto-rejected"));
                }
                self.status = BookingStatus::Rejected;
                self.is_auto_rejected = true;
                self.cancellation_reason = Some(reason.clone());
            }
            TransitionCommand::Cancel { reason, .. } => {
                self.status = BookingStatus::Cancelled;
                self.cancellation_reason.clone_from(reason);
            }
            TransitionCommand::Complete => {
                self.status = BookingStatus::Completed;
                self.completed_at = Some(now);
            }
        }

        self.last_transition_at = Some(now);
        self.last_transition_reason = Some(command.reason());
        Ok(())
    }

    /// Returns true if the response deadline has elapsed while the
    /// booking is still awaiting an answer.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == BookingStatus::Pending && self.response_deadline < now && !self.is_auto_rejected
    }

    /// Returns the end of the scheduled slot.
    #[must_use]
    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_at + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Returns true if the scheduled slot overlaps `[start, end)`.
    #[must_use]
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.scheduled_at < end && start < self.scheduled_end()
    }

    fn transition_error(&self, target: BookingStatus, reason: &str) -> Error {
        Error::InvalidStateTransition {
            from: self.status.to_string(),
            to: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

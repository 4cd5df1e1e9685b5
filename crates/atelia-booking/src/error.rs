//! Error types for the booking reservation domain.
//!
//! Every rejected operation yields a distinct, stable kind so that callers
//! can render precise messaging (e.g. distinguishing "already answered"
//! from "not your booking"). Only [`ErrorKind::Transient`] failures are
//! retryable; everything else is terminal for the invocation.

use atelia_core::{BookingId, UserId};

/// The result type used throughout atelia-booking.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error classification for caller branching.
///
/// The kind is coarser than [`Error`]: several variants share a kind
/// (e.g. a missing booking and a missing provider are both `NotFound`),
/// but a kind never changes for a given variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or missing required input. Never retried.
    Validation,
    /// A referenced booking, user, or service does not exist.
    NotFound,
    /// The acting identity is not entitled to perform the operation.
    Unauthorized,
    /// The operation conflicts with the record's current state.
    Conflict,
    /// The underlying store failed; safe to retry.
    Transient,
}

/// Errors that can occur in booking operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or missing required input.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// A referenced booking was not found.
    #[error("booking not found: {booking_id}")]
    BookingNotFound {
        /// The booking ID that was looked up.
        booking_id: BookingId,
    },

    /// A referenced user, provider, or service was not found.
    #[error("{resource} not found: {id}")]
    ResourceNotFound {
        /// The kind of resource ("requester", "provider", "service").
        resource: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The acting identity may not perform this operation.
    #[error("user {actor} is not authorized to {action} this booking")]
    Unauthorized {
        /// The acting user.
        actor: UserId,
        /// The attempted action ("confirm", "cancel", ...).
        action: &'static str,
    },

    /// An invalid state transition was attempted.
    #[error("invalid state transition: {from} -> {to} ({reason})")]
    InvalidStateTransition {
        /// The current status.
        from: String,
        /// The attempted target status.
        to: String,
        /// The reason the transition is invalid.
        reason: String,
    },

    /// The request conflicts with existing state outside the booking's
    /// own status (e.g. the provider does not offer the service, or an
    /// overlapping confirmed booking exists).
    #[error("conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// A storage operation failed. Transient; retried by the caller (or
    /// by the next watchdog cycle).
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An error from atelia-core.
    #[error("core error: {0}")]
    Core(#[from] atelia_core::Error),
}

impl Error {
    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new storage error with a source.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the stable classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::BookingNotFound { .. } | Self::ResourceNotFound { .. } => ErrorKind::NotFound,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::InvalidStateTransition { .. } | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Storage { .. } | Self::Core(_) => ErrorKind::Transient,
        }
    }

    /// Returns true if the failure is transient and safe to retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn validation_error_display() {
        let err = Error::validation("scheduled_at must be in the future");
        assert!(err.to_string().contains("validation failed"));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn booking_not_found_display() {
        let err = Error::BookingNotFound {
            booking_id: BookingId::generate(),
        };
        assert!(err.to_string().contains("booking not found"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unauthorized_display() {
        let err = Error::Unauthorized {
            actor: UserId::generate(),
            action: "confirm",
        };
        let msg = err.to_string();
        assert!(msg.contains("not authorized"));
        assert!(msg.contains("confirm"));
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn state_transition_error_display() {
        let err = Error::InvalidStateTransition {
            from: "REJECTED".into(),
            to: "CONFIRMED".into(),
            reason: "booking already answered".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("REJECTED"));
        assert!(msg.contains("CONFIRMED"));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn storage_error_with_source_is_transient() {
        let source = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = Error::storage_with_source("failed to load booking", source);
        assert!(err.to_string().contains("storage error"));
        assert!(StdError::source(&err).is_some());
        assert!(err.is_transient());
    }
}

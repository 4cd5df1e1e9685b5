//! # atelia-booking
//!
//! Booking reservation core for the Atelia appointment marketplace.
//!
//! This crate implements the reservation workflow between a requester and
//! a provider, providing:
//!
//! - **State Machine**: Validated booking lifecycle transitions with
//!   explicit reasons
//! - **Workflow Controller**: Create/confirm/reject/cancel/complete with
//!   authorization and precondition checks
//! - **Deadline Watchdog**: Periodic expiry of unanswered requests with
//!   reputation penalties
//! - **Compare-and-Set Store**: Race-free transitions even when a provider
//!   answers at the same instant the deadline elapses
//!
//! ## Core Concepts
//!
//! - **Booking**: The record governing one scheduled service between a
//!   requester and a provider
//! - **Response window**: The fixed budget (5 minutes) a provider has to
//!   answer a PENDING booking before it is auto-rejected
//! - **Reputation**: A bounded score per provider, penalized for
//!   unanswered requests and rewarded for activity
//!
//! ## Guarantees
//!
//! - **Linearizable per booking**: Transitions are applied through
//!   compare-and-set on the current status, so two concurrent actors
//!   cannot both win
//! - **Idempotent expiry**: Scanning the same expired booking twice
//!   applies at most one penalty and one set of notifications
//! - **Bounded rating**: Reputation stays within `[0, 100]` under any
//!   interleaving of penalties and bonuses
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use atelia_booking::clock::SystemClock;
//! use atelia_booking::config::BookingConfig;
//! use atelia_booking::directory::InMemoryDirectory;
//! use atelia_booking::error::Result;
//! use atelia_booking::outbox::InMemoryOutbox;
//! use atelia_booking::store::memory::{InMemoryBookingStore, InMemoryReputationStore};
//! use atelia_booking::workflow::{BookingWorkflow, CreateBooking};
//!
//! # async fn demo() -> Result<()> {
//! let mut directory = InMemoryDirectory::new();
//! let requester = directory.add_user("Mira");
//! let provider = directory.add_provider("Vera");
//! let service = directory.add_service("Gel manicure");
//! directory.add_offering(provider, service, Some(60), None);
//!
//! let workflow = BookingWorkflow::new(
//!     Arc::new(InMemoryBookingStore::new()),
//!     Arc::new(InMemoryReputationStore::new()),
//!     Arc::new(directory),
//!     Arc::new(SystemClock),
//!     BookingConfig::default(),
//! );
//!
//! let mut outbox = InMemoryOutbox::new();
//! let request = CreateBooking {
//!     requester_id: requester,
//!     provider_id: provider,
//!     service_id: service,
//!     scheduled_at: chrono::Utc::now() + chrono::Duration::hours(1),
//!     duration_minutes: None,
//!     notes: None,
//! };
//! let booking = workflow.create(request, &mut outbox).await?;
//! let _confirmed = workflow.confirm(booking.id, provider, &mut outbox).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod booking;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod metrics;
pub mod outbox;
pub mod reputation;
pub mod store;
pub mod watchdog;
pub mod workflow;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::booking::{
        Booking, BookingStatus, CancellerRole, TransitionCommand, TransitionReason,
    };
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::BookingConfig;
    pub use crate::directory::{Directory, InMemoryDirectory, Offering};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::events::{NotificationEvent, NotificationType};
    pub use crate::outbox::{EventSink, InMemoryOutbox};
    pub use crate::reputation::{ProviderReputation, RatingAdjustment, ReputationStats};
    pub use crate::store::memory::{InMemoryBookingStore, InMemoryReputationStore};
    pub use crate::store::{
        BookingCounts, BookingStore, CasOutcome, Page, PageRequest, ReputationStore,
    };
    pub use crate::watchdog::{DeadlineWatchdog, ScanSummary};
    pub use crate::workflow::{BookingWorkflow, CreateBooking};
}

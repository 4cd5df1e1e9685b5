//! # atelia-core
//!
//! Core abstractions for the Atelia appointment marketplace.
//!
//! This crate provides the foundational types used across all Atelia
//! components:
//!
//! - **Identifiers**: Strongly-typed ULID identifiers for bookings, users,
//!   services, and events
//! - **Error Types**: Shared error definitions and result types
//! - **Observability**: Tracing subscriber initialization helpers
//!
//! ## Crate Boundary
//!
//! `atelia-core` is the only crate allowed to define shared primitives.
//! Domain crates (booking, catalog, ...) depend on it and never on each
//! other's internals.
//!
//! ## Example
//!
//! ```rust
//! use atelia_core::prelude::*;
//!
//! let booking_id = BookingId::generate();
//! let user_id = UserId::generate();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod id;
pub mod observability;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use atelia_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::id::{BookingId, EventId, ServiceId, UserId};
}

pub use error::{Error, Result};
pub use id::{BookingId, EventId, ServiceId, UserId};

//! Event sink and in-memory outbox for notification events.
//!
//! Workflow operations produce notification events describing booking
//! lifecycle changes. Event emission is decoupled from delivery: the
//! workflow pushes into an [`EventSink`] and callers decide when and how
//! to forward the collected events to their delivery channels.

use crate::events::NotificationEvent;

/// A sink for notification events emitted by booking operations.
///
/// This is intentionally synchronous: the workflow stays deterministic
/// and side-effect free, while callers decide when/how to deliver events.
/// `Send` is required so a sink can ride inside a spawned watchdog task.
pub trait EventSink: Send {
    /// Records an event for later delivery.
    fn push(&mut self, event: NotificationEvent);
}

/// In-memory outbox for collecting notification events.
#[derive(Debug, Default)]
pub struct InMemoryOutbox {
    events: Vec<NotificationEvent>,
}

impl InMemoryOutbox {
    /// Creates a new empty outbox.
    #[must_use]
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> &[NotificationEvent] {
        &self.events
    }

    /// Drains the outbox, returning all events in insertion order.
    pub fn drain(&mut self) -> Vec<NotificationEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for InMemoryOutbox {
    fn push(&mut self, event: NotificationEvent) {
        self.events.push(event);
    }
}

//! Event handler registration and dispatch.
//!
//! Each aggregate state type builds one [`EventHandlers`] table, once, mapping
//! every event kind it consumes to the function that mutates it. Dispatch is a
//! table lookup keyed by [`DomainEvent::event_type`].

use std::collections::HashMap;
use std::fmt;

use crate::aggregate::AggregateState;
use crate::error::DomainError;
use crate::event::DomainEvent;

/// A mutation function for one event kind.
pub type EventHandler<S> = fn(&mut S, &<S as AggregateState>::Event) -> Result<(), DomainError>;

/// Registration-time table of event handlers for an aggregate state type.
pub struct EventHandlers<S: AggregateState> {
    handlers: HashMap<&'static str, EventHandler<S>>,
}

impl<S: AggregateState> EventHandlers<S> {
    /// Creates an empty handler table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for events tagged `event_type`.
    ///
    /// # Panics
    ///
    /// Panics if a handler is already registered for `event_type`.
    #[must_use]
    pub fn on(mut self, event_type: &'static str, handler: EventHandler<S>) -> Self {
        let previous = self.handlers.insert(event_type, handler);
        assert!(
            previous.is_none(),
            "aggregate {} registers more than one handler for {event_type}",
            S::AGGREGATE_TYPE
        );
        self
    }

    /// Returns `true` if a handler is registered for `event_type`.
    #[must_use]
    pub fn handles(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Returns the registered event kinds, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.handlers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invokes the handler registered for the event's kind.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::HandlerNotFound` if no handler is registered for
    /// the event's kind, or whatever error the handler itself returns.
    pub fn dispatch(&self, state: &mut S, event: &S::Event) -> Result<(), DomainError> {
        let event_type = event.event_type();
        let handler = self
            .handlers
            .get(event_type)
            .ok_or_else(|| DomainError::HandlerNotFound {
                aggregate_type: S::AGGREGATE_TYPE,
                event_type: event_type.to_owned(),
            })?;
        handler(state, event)
    }
}

impl<S: AggregateState> Default for EventHandlers<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AggregateState> fmt::Debug for EventHandlers<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("aggregate_type", &S::AGGREGATE_TYPE)
            .field("event_types", &self.event_types())
            .finish()
    }
}

//! Aggregate root abstraction.
//!
//! An [`Aggregate`] never stores its state directly: the state is derived by
//! applying events in stream order. Historical events enter through
//! [`Aggregate::replay`] and are not buffered. New events enter through
//! [`Aggregate::raise`] and are buffered until the caller has persisted them
//! and calls [`Aggregate::mark_changes_as_committed`].

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::handlers::EventHandlers;

/// Version of an aggregate that has not applied any event.
pub const UNPERSISTED_VERSION: i64 = -1;

/// Domain state owned by a concrete aggregate type.
///
/// State is only ever changed by the handlers returned from
/// [`handlers`](AggregateState::handlers), which must contain exactly one
/// handler for every event kind the aggregate can raise.
///
/// `raise` and `replay` clone the state before dispatching so a failed handler
/// can be rolled back, so `Clone` should stay cheap. Keep large collections
/// behind `Arc` or split the aggregate.
pub trait AggregateState: Default + Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Aggregate type name, used in errors and logs.
    const AGGREGATE_TYPE: &'static str;

    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent + 'static;

    /// Returns the handler table for this state type. The table is built once
    /// per type, not per instance.
    fn handlers() -> &'static EventHandlers<Self>;
}

/// Persistence readiness of an aggregate instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Freshly constructed; nothing replayed or raised.
    Unpersisted,
    /// History replayed (possibly empty); no pending writes.
    Loaded,
    /// At least one raised event awaits persistence.
    Dirty,
    /// Raised events were persisted and marked committed.
    Clean,
}

impl Lifecycle {
    /// Returns `true` if the aggregate must be persisted before it may be
    /// discarded.
    #[must_use]
    pub fn has_pending_changes(self) -> bool {
        matches!(self, Self::Dirty)
    }
}

/// Event-sourced aggregate: identity, version, derived state and the buffer
/// of uncommitted events.
#[derive(Debug, Clone)]
pub struct Aggregate<S: AggregateState> {
    id: Option<Uuid>,
    version: i64,
    state: S,
    uncommitted_events: Vec<S::Event>,
    lifecycle: Lifecycle,
}

impl<S: AggregateState> Default for Aggregate<S> {
    /// Creates an aggregate without identity. The identity is taken from the
    /// first event applied.
    fn default() -> Self {
        Self {
            id: None,
            version: UNPERSISTED_VERSION,
            state: S::default(),
            uncommitted_events: Vec::new(),
            lifecycle: Lifecycle::Unpersisted,
        }
    }
}

impl<S: AggregateState> Aggregate<S> {
    /// Creates a new aggregate for the stream identified by `id`.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Returns the aggregate identifier, if set.
    #[must_use]
    pub fn aggregate_id(&self) -> Option<Uuid> {
        self.id
    }

    /// Returns the current version: the sequence number of the last applied
    /// event, or [`UNPERSISTED_VERSION`].
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Returns the version the event store must currently hold for the
    /// uncommitted events to be appended.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn expected_version(&self) -> i64 {
        self.version - self.uncommitted_events.len() as i64
    }

    /// Returns the sequence number the next raised event must carry.
    #[must_use]
    pub fn next_version(&self) -> i64 {
        self.version + 1
    }

    /// Returns the current domain state.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Returns the persistence readiness of this instance.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Returns uncommitted events in the order they were raised.
    #[must_use]
    pub fn uncommitted_events(&self) -> &[S::Event] {
        &self.uncommitted_events
    }

    /// Rebuilds state from persisted history without buffering anything.
    ///
    /// Either every event is applied or, on error, the aggregate is left
    /// exactly as it was before the call.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::HandlerNotFound` if an event kind has no handler,
    /// `DomainError::AggregateMismatch` or `DomainError::OutOfSequence` if the
    /// history does not belong to this aggregate or has a gap, or any error
    /// returned by a handler.
    pub fn replay<'a, I>(&mut self, events: I) -> Result<(), DomainError>
    where
        I: IntoIterator<Item = &'a S::Event>,
    {
        let mut state = self.state.clone();
        let mut id = self.id;
        let mut version = self.version;

        for event in events {
            apply(&mut state, &mut id, version, event).inspect_err(|err| {
                warn!(
                    aggregate_type = S::AGGREGATE_TYPE,
                    event_type = event.event_type(),
                    error = %err,
                    "replay failed"
                );
            })?;
            version += 1;
        }

        let replayed = version - self.version;
        self.state = state;
        self.id = id;
        self.version = version;
        if self.uncommitted_events.is_empty() {
            self.lifecycle = Lifecycle::Loaded;
        }

        debug!(
            aggregate_type = S::AGGREGATE_TYPE,
            aggregate_id = ?self.id,
            replayed,
            version = self.version,
            "replayed event history"
        );
        Ok(())
    }

    /// Applies a newly produced event and buffers it for persistence.
    ///
    /// Intended to be called from the aggregate's own domain operations after
    /// they have validated the command. On error the state, version and
    /// buffer are unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`replay`](Self::replay).
    pub fn raise(&mut self, event: S::Event) -> Result<(), DomainError> {
        let mut state = self.state.clone();
        let mut id = self.id;

        apply(&mut state, &mut id, self.version, &event).inspect_err(|err| {
            warn!(
                aggregate_type = S::AGGREGATE_TYPE,
                event_type = event.event_type(),
                error = %err,
                "raise failed"
            );
        })?;

        self.state = state;
        self.id = id;
        self.version += 1;
        debug!(
            aggregate_type = S::AGGREGATE_TYPE,
            aggregate_id = ?self.id,
            event_type = event.event_type(),
            version = self.version,
            "raised event"
        );
        self.uncommitted_events.push(event);
        self.lifecycle = Lifecycle::Dirty;
        Ok(())
    }

    /// Clears the uncommitted buffer. Call only after the store confirmed the
    /// buffered events were persisted. The version is not changed.
    pub fn mark_changes_as_committed(&mut self) {
        if self.uncommitted_events.is_empty() {
            return;
        }
        debug!(
            aggregate_type = S::AGGREGATE_TYPE,
            aggregate_id = ?self.id,
            committed = self.uncommitted_events.len(),
            version = self.version,
            "marked changes as committed"
        );
        self.uncommitted_events.clear();
        self.lifecycle = Lifecycle::Clean;
    }
}

/// Checks stream integrity and dispatches one event against a working copy.
fn apply<S: AggregateState>(
    state: &mut S,
    id: &mut Option<Uuid>,
    version: i64,
    event: &S::Event,
) -> Result<(), DomainError> {
    let metadata = event.metadata();
    if let Some(expected) = id.filter(|expected| *expected != metadata.aggregate_id) {
        return Err(DomainError::AggregateMismatch {
            expected,
            actual: metadata.aggregate_id,
        });
    }

    let expected_sequence = version + 1;
    if metadata.sequence_number != expected_sequence {
        return Err(DomainError::OutOfSequence {
            aggregate_id: metadata.aggregate_id,
            expected: expected_sequence,
            actual: metadata.sequence_number,
        });
    }

    S::handlers().dispatch(state, event)?;
    *id = Some(metadata.aggregate_id);
    Ok(())
}

/// Trait for aggregate roots that reconstitute from event history.
///
/// Concrete aggregates wrap an [`Aggregate`] and expose their domain
/// operations; command handlers work through this trait.
pub trait AggregateRoot: Send + Sync {
    /// The domain state of this aggregate.
    type State: AggregateState;

    /// Returns the underlying aggregate.
    fn root(&self) -> &Aggregate<Self::State>;

    /// Returns the underlying aggregate mutably.
    fn root_mut(&mut self) -> &mut Aggregate<Self::State>;

    /// Returns the aggregate identifier, if set.
    fn aggregate_id(&self) -> Option<Uuid> {
        self.root().aggregate_id()
    }

    /// Returns the current version.
    fn version(&self) -> i64 {
        self.root().version()
    }

    /// Returns the version the store must hold for the pending append.
    fn expected_version(&self) -> i64 {
        self.root().expected_version()
    }

    /// Returns the persistence readiness of this instance.
    fn lifecycle(&self) -> Lifecycle {
        self.root().lifecycle()
    }

    /// Rebuilds state from persisted history.
    ///
    /// # Errors
    ///
    /// See [`Aggregate::replay`].
    fn replay<'a, I>(&mut self, events: I) -> Result<(), DomainError>
    where
        I: IntoIterator<Item = &'a <Self::State as AggregateState>::Event>,
    {
        self.root_mut().replay(events)
    }

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[<Self::State as AggregateState>::Event] {
        self.root().uncommitted_events()
    }

    /// Clears uncommitted events after persistence.
    fn mark_changes_as_committed(&mut self) {
        self.root_mut().mark_changes_as_committed();
    }
}

impl<S: AggregateState> AggregateRoot for Aggregate<S> {
    type State = S;

    fn root(&self) -> &Aggregate<S> {
        self
    }

    fn root_mut(&mut self) -> &mut Aggregate<S> {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use chrono::{TimeZone, Utc};
    use serde::Serialize;

    use super::*;
    use crate::event::EventMetadata;

    const INCREMENTED: &str = "counter.incremented";
    const RESET: &str = "counter.reset";
    const DOUBLED: &str = "counter.doubled";
    const LIMIT: i64 = 100;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    enum CounterEventKind {
        Incremented { by: i64 },
        Reset,
        // Deliberately left without a handler.
        Doubled,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct CounterEvent {
        metadata: EventMetadata,
        kind: CounterEventKind,
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            match self.kind {
                CounterEventKind::Incremented { .. } => INCREMENTED,
                CounterEventKind::Reset => RESET,
                CounterEventKind::Doubled => DOUBLED,
            }
        }

        fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
            serde_json::to_value(&self.kind)
        }

        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Counter {
        total: i64,
        increments: u32,
    }

    static COUNTER_HANDLERS: LazyLock<EventHandlers<Counter>> = LazyLock::new(|| {
        EventHandlers::new()
            .on(INCREMENTED, on_incremented)
            .on(RESET, on_reset)
    });

    // Mutates before validating so the tests can observe rollback.
    fn on_incremented(state: &mut Counter, event: &CounterEvent) -> Result<(), DomainError> {
        let CounterEventKind::Incremented { by } = event.kind else {
            return Err(DomainError::HandlerNotFound {
                aggregate_type: Counter::AGGREGATE_TYPE,
                event_type: event.event_type().to_owned(),
            });
        };
        state.increments += 1;
        state.total += by;
        if state.total > LIMIT {
            return Err(DomainError::Validation(format!(
                "counter exceeds {LIMIT}"
            )));
        }
        Ok(())
    }

    fn on_reset(state: &mut Counter, _event: &CounterEvent) -> Result<(), DomainError> {
        state.total = 0;
        Ok(())
    }

    impl AggregateState for Counter {
        const AGGREGATE_TYPE: &'static str = "counter";
        type Event = CounterEvent;

        fn handlers() -> &'static EventHandlers<Self> {
            &COUNTER_HANDLERS
        }
    }

    fn event(aggregate_id: Uuid, sequence_number: i64, kind: CounterEventKind) -> CounterEvent {
        let correlation_id = Uuid::new_v4();
        let mut event = CounterEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: String::new(),
                aggregate_id,
                sequence_number,
                correlation_id,
                causation_id: correlation_id,
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
            kind,
        };
        event.metadata.event_type = event.event_type().to_owned();
        event
    }

    fn history(aggregate_id: Uuid) -> Vec<CounterEvent> {
        vec![
            event(aggregate_id, 0, CounterEventKind::Incremented { by: 5 }),
            event(aggregate_id, 1, CounterEventKind::Incremented { by: 7 }),
            event(aggregate_id, 2, CounterEventKind::Reset),
            event(aggregate_id, 3, CounterEventKind::Incremented { by: 3 }),
        ]
    }

    #[test]
    fn test_new_aggregate_starts_unpersisted() {
        // Arrange
        let id = Uuid::new_v4();

        // Act
        let counter = Aggregate::<Counter>::new(id);

        // Assert
        assert_eq!(counter.aggregate_id(), Some(id));
        assert_eq!(counter.version(), UNPERSISTED_VERSION);
        assert_eq!(counter.state(), &Counter::default());
        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.lifecycle(), Lifecycle::Unpersisted);
    }

    #[test]
    fn test_replay_of_empty_history_keeps_sentinel_version() {
        // Arrange
        let mut counter = Aggregate::<Counter>::new(Uuid::new_v4());

        // Act
        counter.replay(&[] as &[CounterEvent]).unwrap();

        // Assert
        assert_eq!(counter.version(), UNPERSISTED_VERSION);
        assert_eq!(counter.state(), &Counter::default());
        assert_eq!(counter.lifecycle(), Lifecycle::Loaded);
    }

    #[test]
    fn test_replay_rebuilds_state_without_buffering() {
        // Arrange
        let id = Uuid::new_v4();
        let events = history(id);
        let mut counter = Aggregate::<Counter>::new(id);

        // Act
        counter.replay(&events).unwrap();

        // Assert
        assert_eq!(counter.state().total, 3);
        assert_eq!(counter.state().increments, 3);
        assert_eq!(counter.version(), 3);
        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.lifecycle(), Lifecycle::Loaded);
        assert!(!counter.lifecycle().has_pending_changes());
    }

    #[test]
    fn test_raise_buffers_events_in_call_order() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);
        counter
            .replay(&[event(id, 0, CounterEventKind::Incremented { by: 1 })])
            .unwrap();
        let before = counter.version();

        // Act
        let first = event(id, 1, CounterEventKind::Incremented { by: 2 });
        let second = event(id, 2, CounterEventKind::Reset);
        let third = event(id, 3, CounterEventKind::Incremented { by: 4 });
        counter.raise(first.clone()).unwrap();
        counter.raise(second.clone()).unwrap();
        counter.raise(third.clone()).unwrap();

        // Assert
        assert_eq!(counter.uncommitted_events(), &[first, second, third]);
        assert_eq!(counter.version(), before + 3);
        assert_eq!(counter.expected_version(), before);
        assert_eq!(counter.next_version(), before + 4);
        assert_eq!(counter.state().total, 4);
        assert_eq!(counter.lifecycle(), Lifecycle::Dirty);
        assert!(counter.lifecycle().has_pending_changes());
    }

    #[test]
    fn test_mark_changes_as_committed_clears_buffer_and_keeps_version() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);
        counter
            .raise(event(id, 0, CounterEventKind::Incremented { by: 1 }))
            .unwrap();
        counter
            .raise(event(id, 1, CounterEventKind::Incremented { by: 1 }))
            .unwrap();

        // Act
        counter.mark_changes_as_committed();

        // Assert
        assert!(counter.uncommitted_events().is_empty());
        assert_eq!(counter.version(), 1);
        assert_eq!(counter.expected_version(), 1);
        assert_eq!(counter.lifecycle(), Lifecycle::Clean);
    }

    #[test]
    fn test_mark_changes_as_committed_without_changes_is_a_no_op() {
        let mut counter = Aggregate::<Counter>::new(Uuid::new_v4());
        counter.replay(&[] as &[CounterEvent]).unwrap();

        counter.mark_changes_as_committed();

        assert_eq!(counter.lifecycle(), Lifecycle::Loaded);
        assert_eq!(counter.version(), UNPERSISTED_VERSION);
    }

    #[test]
    fn test_replay_and_raise_produce_the_same_state() {
        // Arrange
        let id = Uuid::new_v4();
        let events = history(id);
        let mut replayed = Aggregate::<Counter>::new(id);
        let mut raised = Aggregate::<Counter>::new(id);

        // Act
        replayed.replay(&events).unwrap();
        for event in events.iter().cloned() {
            raised.raise(event).unwrap();
        }

        // Assert
        assert_eq!(replayed.state(), raised.state());
        assert_eq!(replayed.version(), raised.version());
        assert!(replayed.uncommitted_events().is_empty());
        assert_eq!(raised.uncommitted_events(), events.as_slice());
    }

    #[test]
    fn test_raise_without_handler_leaves_aggregate_unchanged() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);
        counter
            .raise(event(id, 0, CounterEventKind::Incremented { by: 9 }))
            .unwrap();
        let state_before = counter.state().clone();
        let buffer_before = counter.uncommitted_events().to_vec();

        // Act
        let result = counter.raise(event(id, 1, CounterEventKind::Doubled));

        // Assert
        match result.unwrap_err() {
            DomainError::HandlerNotFound {
                aggregate_type,
                event_type,
            } => {
                assert_eq!(aggregate_type, "counter");
                assert_eq!(event_type, DOUBLED);
            }
            other => panic!("expected HandlerNotFound, got {other:?}"),
        }
        assert_eq!(counter.state(), &state_before);
        assert_eq!(counter.uncommitted_events(), buffer_before.as_slice());
        assert_eq!(counter.version(), 0);
    }

    #[test]
    fn test_replay_without_handler_fails_and_leaves_aggregate_unchanged() {
        // Arrange
        let id = Uuid::new_v4();
        let events = vec![
            event(id, 0, CounterEventKind::Incremented { by: 2 }),
            event(id, 1, CounterEventKind::Doubled),
        ];
        let mut counter = Aggregate::<Counter>::new(id);

        // Act
        let result = counter.replay(&events);

        // Assert
        assert!(matches!(
            result,
            Err(DomainError::HandlerNotFound { ref event_type, .. }) if event_type == DOUBLED
        ));
        assert_eq!(counter.state(), &Counter::default());
        assert_eq!(counter.version(), UNPERSISTED_VERSION);
        assert_eq!(counter.lifecycle(), Lifecycle::Unpersisted);
    }

    #[test]
    fn test_failing_handler_is_rolled_back() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);
        counter
            .raise(event(id, 0, CounterEventKind::Incremented { by: 60 }))
            .unwrap();

        // Act
        let result = counter.raise(event(id, 1, CounterEventKind::Incremented { by: 60 }));

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(
            counter.state(),
            &Counter {
                total: 60,
                increments: 1
            }
        );
        assert_eq!(counter.version(), 0);
        assert_eq!(counter.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_event_from_another_stream_is_rejected() {
        // Arrange
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);

        // Act
        let result = counter.raise(event(other, 0, CounterEventKind::Reset));

        // Assert
        match result.unwrap_err() {
            DomainError::AggregateMismatch { expected, actual } => {
                assert_eq!(expected, id);
                assert_eq!(actual, other);
            }
            other => panic!("expected AggregateMismatch, got {other:?}"),
        }
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn test_gap_in_history_is_rejected() {
        // Arrange
        let id = Uuid::new_v4();
        let events = vec![
            event(id, 0, CounterEventKind::Incremented { by: 1 }),
            event(id, 2, CounterEventKind::Incremented { by: 1 }),
        ];
        let mut counter = Aggregate::<Counter>::new(id);

        // Act
        let result = counter.replay(&events);

        // Assert
        match result.unwrap_err() {
            DomainError::OutOfSequence {
                aggregate_id,
                expected,
                actual,
            } => {
                assert_eq!(aggregate_id, id);
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected OutOfSequence, got {other:?}"),
        }
        assert_eq!(counter.version(), UNPERSISTED_VERSION);
    }

    #[test]
    fn test_identity_is_adopted_from_first_event() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::default();

        // Act
        counter.replay(&history(id)).unwrap();

        // Assert
        assert_eq!(counter.aggregate_id(), Some(id));
        let stray = counter.raise(event(Uuid::new_v4(), 4, CounterEventKind::Reset));
        assert!(matches!(stray, Err(DomainError::AggregateMismatch { .. })));
    }

    #[test]
    fn test_aggregate_root_trait_delegates_to_aggregate() {
        // Arrange
        let id = Uuid::new_v4();
        let mut counter = Aggregate::<Counter>::new(id);

        // Act
        AggregateRoot::replay(&mut counter, &history(id)).unwrap();
        counter
            .raise(event(id, 4, CounterEventKind::Incremented { by: 1 }))
            .unwrap();

        // Assert
        assert_eq!(AggregateRoot::expected_version(&counter), 3);
        assert_eq!(AggregateRoot::uncommitted_events(&counter).len(), 1);
        AggregateRoot::mark_changes_as_committed(&mut counter);
        assert_eq!(AggregateRoot::lifecycle(&counter), Lifecycle::Clean);
        assert_eq!(AggregateRoot::version(&counter), 4);
    }
}

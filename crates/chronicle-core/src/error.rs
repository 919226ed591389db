//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No handler is registered on the aggregate for an event kind.
    #[error("no handler registered on aggregate {aggregate_type} for event {event_type}")]
    HandlerNotFound {
        /// The aggregate type that received the event.
        aggregate_type: &'static str,
        /// The event kind that could not be dispatched.
        event_type: String,
    },

    /// An event belonging to another stream was applied to an aggregate.
    #[error("event for aggregate {actual} applied to aggregate {expected}")]
    AggregateMismatch {
        /// The identity of the aggregate applying the event.
        expected: Uuid,
        /// The identity carried by the event.
        actual: Uuid,
    },

    /// An event does not directly follow the aggregate's current version.
    #[error("event out of sequence on aggregate {aggregate_id}: expected {expected}, found {actual}")]
    OutOfSequence {
        /// The aggregate applying the event.
        aggregate_id: Uuid,
        /// The sequence number the aggregate expected next.
        expected: i64,
        /// The sequence number carried by the event.
        actual: i64,
    },

    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when reloading the aggregate and retrying the whole
    /// operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

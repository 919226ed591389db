//! In-memory implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::aggregate::UNPERSISTED_VERSION;
use chronicle_core::error::DomainError;
use chronicle_core::repository::{EventRepository, StoredEvent};

/// Event repository that keeps one ordered stream per aggregate in memory.
#[derive(Debug, Default)]
pub struct InMemoryEventRepository {
    streams: RwLock<HashMap<Uuid, Vec<StoredEvent>>>,
}

impl InMemoryEventRepository {
    /// Creates an empty `InMemoryEventRepository`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the sequence number of the last event in the stream, or
    /// `UNPERSISTED_VERSION` if the stream does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn current_version(&self, aggregate_id: Uuid) -> Result<i64, DomainError> {
        let streams = self.streams.read().map_err(lock_poisoned)?;
        Ok(stream_version(streams.get(&aggregate_id)))
    }

    /// Returns the number of non-empty streams.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn stream_count(&self) -> Result<usize, DomainError> {
        let streams = self.streams.read().map_err(lock_poisoned)?;
        Ok(streams.len())
    }
}

fn stream_version(stream: Option<&Vec<StoredEvent>>) -> i64 {
    stream
        .and_then(|events| events.last())
        .map_or(UNPERSISTED_VERSION, |event| event.sequence_number)
}

#[allow(clippy::needless_pass_by_value)]
fn lock_poisoned<T>(err: std::sync::PoisonError<T>) -> DomainError {
    DomainError::Infrastructure(format!("event store lock poisoned: {err}"))
}

/// Checks that `events` continue the stream at `expected_version`.
fn validate_batch(
    aggregate_id: Uuid,
    expected_version: i64,
    events: &[StoredEvent],
) -> Result<(), DomainError> {
    for (next, event) in (expected_version + 1..).zip(events) {
        if event.aggregate_id != aggregate_id {
            return Err(DomainError::Validation(format!(
                "event {} belongs to aggregate {}, not {aggregate_id}",
                event.event_id, event.aggregate_id
            )));
        }
        if event.sequence_number != next {
            return Err(DomainError::Validation(format!(
                "event {} has sequence number {}, expected {next}",
                event.event_id, event.sequence_number
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    #[instrument(skip(self))]
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.streams.read().map_err(lock_poisoned)?;
        let events = streams.get(&aggregate_id).cloned().unwrap_or_default();
        debug!(count = events.len(), "loaded events");
        Ok(events)
    }

    #[instrument(skip(self, events), fields(event_count = events.len()))]
    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        let mut streams = self.streams.write().map_err(lock_poisoned)?;

        let actual = stream_version(streams.get(&aggregate_id));
        if actual != expected_version {
            warn!(expected_version, actual, "concurrency conflict");
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual,
            });
        }

        if events.is_empty() {
            return Ok(());
        }
        validate_batch(aggregate_id, expected_version, events)?;

        streams
            .entry(aggregate_id)
            .or_default()
            .extend_from_slice(events);
        debug!(count = events.len(), "appended events");
        Ok(())
    }
}

//! Test repositories — mock `EventRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::aggregate::UNPERSISTED_VERSION;
use chronicle_core::error::DomainError;
use chronicle_core::repository::{EventRepository, StoredEvent};
use uuid::Uuid;

/// An event repository that records all `append_events` calls. Returns the
/// configured history from every `load_events` call and always succeeds on
/// `append_events`.
#[derive(Debug)]
pub struct RecordingEventRepository {
    history: Vec<StoredEvent>,
    appended: Mutex<Vec<(Uuid, i64, Vec<StoredEvent>)>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `history` from
    /// every `load_events` call.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all appends as
    /// `(aggregate_id, expected_version, events)`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(Uuid, i64, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.history.clone())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id, expected_version, events.to_vec()));
        Ok(())
    }
}

/// An event repository whose streams are always empty. Appends are accepted
/// only at `UNPERSISTED_VERSION`, as a real store would for a brand-new stream.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        if expected_version == UNPERSISTED_VERSION {
            Ok(())
        } else {
            Err(DomainError::ConcurrencyConflict {
                aggregate_id,
                expected: expected_version,
                actual: UNPERSISTED_VERSION,
            })
        }
    }
}

/// An event repository whose store is unreachable: every call fails with an
/// infrastructure error naming the operation and stream.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(&self, aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure(format!(
            "event store unavailable while loading stream {aggregate_id}"
        )))
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        _expected_version: i64,
        events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure(format!(
            "event store unavailable while appending {} events to stream {aggregate_id}",
            events.len()
        )))
    }
}

/// An event repository that loads the configured history but rejects every
/// append as if another writer had already advanced the stream to
/// `actual_version`.
#[derive(Debug)]
pub struct ConflictingEventRepository {
    history: Vec<StoredEvent>,
    actual_version: i64,
}

impl ConflictingEventRepository {
    /// Create a repository returning `history` and reporting `actual_version`
    /// on every append.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>, actual_version: i64) -> Self {
        Self {
            history,
            actual_version,
        }
    }
}

#[async_trait]
impl EventRepository for ConflictingEventRepository {
    async fn load_events(&self, _aggregate_id: Uuid) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.history.clone())
    }

    async fn append_events(
        &self,
        aggregate_id: Uuid,
        expected_version: i64,
        _events: &[StoredEvent],
    ) -> Result<(), DomainError> {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id,
            expected: expected_version,
            actual: self.actual_version,
        })
    }
}

//! Shared test mocks and utilities for the Chronicle workspace.

mod clock;
mod repository;

pub use clock::FixedClock;
pub use repository::{
    ConflictingEventRepository, EmptyEventRepository, FailingEventRepository,
    RecordingEventRepository,
};

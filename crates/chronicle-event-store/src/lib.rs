//! Chronicle Event Store — event persistence behind the `EventRepository`
//! trait.

pub mod in_memory_event_repository;

pub use in_memory_event_repository::InMemoryEventRepository;

//! Chronicle Core — event-sourced aggregate abstractions.
//!
//! This crate defines the aggregate base every event-sourced domain model
//! builds on, together with the collaborator traits (event store, clock,
//! commands) it meets at its boundary. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod handlers;
pub mod repository;

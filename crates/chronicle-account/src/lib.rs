//! Chronicle — Account reference bounded context.
//!
//! A bank account modelled on the event-sourced aggregate base: opening,
//! deposits, withdrawals and closing, with command handlers that run the
//! load, replay, mutate, persist and commit cycle against an event store.

pub mod application;
pub mod domain;

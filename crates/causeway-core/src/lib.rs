//! Causeway core: shared abstractions.
//!
//! This crate defines the contracts the rest of the workspace builds on:
//! aggregates and domain events, the event store, the unit of work, the
//! clock, and the common error type. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod store;
pub mod uow;

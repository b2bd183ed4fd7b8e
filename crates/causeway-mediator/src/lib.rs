//! Causeway mediator: routes commands and queries to exactly one handler
//! and wraps execution in an ordered chain of pipeline behaviors.
//!
//! Handlers and behaviors are bound at build time into a `TypeId`-keyed
//! table of thunks; `send` is a map lookup plus a direct call through the
//! behavior chain.

pub mod behavior;
pub mod behaviors;
pub mod handler;
pub mod mediator;
pub mod request;

//! Causeway saga: correlation of message sequences into long-running
//! process state.
//!
//! A saga instance moves NotStarted → Active → Completed. Handlers are bound
//! to message types at registration time into a `TypeId`-keyed descriptor
//! table, so per-message dispatch is a map lookup plus a direct call.
//! Completed instances are deleted; a later starter message for the same
//! correlation id begins a brand-new instance.

pub mod coordinator;
pub mod registry;
pub mod state;
pub mod store;

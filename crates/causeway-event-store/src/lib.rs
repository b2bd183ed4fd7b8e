//! Causeway event store: append-only stream storage and the repository
//! that replays it into aggregates.

pub mod memory;
pub mod repository;

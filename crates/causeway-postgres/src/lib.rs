//! PostgreSQL-backed implementations of the Causeway store contracts.
//!
//! Every store takes the pool at construction and participates in a
//! [`PgUnitOfWork`](uow::PgUnitOfWork) when one is passed, so an event
//! append and its outbox enqueue commit in the same database transaction.
//! Schema lives in the workspace `migrations/` directory.

pub mod event_store;
pub mod inbox_store;
pub mod outbox_store;
pub mod saga_store;
pub mod uow;

pub use event_store::PgEventStore;
pub use inbox_store::PgInboxStore;
pub use outbox_store::PgOutboxStore;
pub use saga_store::PgSagaStore;
pub use uow::{PgUnitOfWork, PgUnitOfWorkFactory};

use causeway_core::error::CoreError;

pub(crate) fn storage_err(error: sqlx::Error) -> CoreError {
    CoreError::Storage(error.to_string())
}

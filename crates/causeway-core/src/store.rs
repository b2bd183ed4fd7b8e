//! Event store contract.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::event::EventEnvelope;
use crate::uow::UnitOfWork;

/// Append-only per-stream event log with optimistic concurrency.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `envelopes` to a stream.
    ///
    /// `expected_version` must equal the current head version of the stream
    /// (0 for a brand-new stream); the envelopes carry versions
    /// `expected_version + 1, expected_version + 2, ...`. When a unit of
    /// work is passed the append participates in it and only becomes visible
    /// on commit; otherwise the append is atomic on its own.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Concurrency`] on an expected-version mismatch;
    /// the caller reloads the aggregate and retries, the store never retries
    /// on its own. Returns [`CoreError::Storage`] for backend failures.
    async fn append(
        &self,
        uow: Option<&dyn UnitOfWork>,
        stream_id: Uuid,
        expected_version: i64,
        envelopes: &[EventEnvelope],
    ) -> Result<(), CoreError>;

    /// Reads the ordered envelopes of a stream with version > `from_version`.
    ///
    /// An unknown stream yields an empty vec; "no history" is the valid
    /// state of a brand-new aggregate, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn read_stream(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<EventEnvelope>, CoreError>;
}

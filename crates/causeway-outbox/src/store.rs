//! Outbox store contract and in-memory implementation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use causeway_core::error::CoreError;
use causeway_core::uow::{MemoryUnitOfWork, UnitOfWork};

use crate::message::{OutboxMessage, PendingMessage};

/// Durable store for outbox rows.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Persists messages. When a unit of work is passed the rows only become
    /// visible on commit; this is the transactional half of the outbox
    /// pattern.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn enqueue(
        &self,
        uow: Option<&dyn UnitOfWork>,
        messages: &[OutboxMessage],
    ) -> Result<(), CoreError>;

    /// Up to `batch_size` undispatched rows with `attempts < max_attempts`,
    /// oldest first (bounds staleness).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn pending(
        &self,
        batch_size: usize,
        max_attempts: u32,
    ) -> Result<Vec<PendingMessage>, CoreError>;

    /// Marks a message delivered at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures or an unknown
    /// message id.
    async fn record_success(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), CoreError>;

    /// Records a failed attempt: increments the attempt count and stores the
    /// error text and attempt time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures or an unknown
    /// message id.
    async fn record_failure(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), CoreError>;

    /// Number of undispatched rows, for operational visibility.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn pending_count(&self) -> Result<u64, CoreError>;
}

/// In-memory outbox store. Stages `enqueue` into a [`MemoryUnitOfWork`] when
/// one is passed, so commit-time visibility can be exercised without a
/// database.
#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    rows: Arc<Mutex<Vec<PendingMessage>>>,
}

impl InMemoryOutboxStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every row, dispatched or not. Test/inspection helper.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn rows(&self) -> Vec<PendingMessage> {
        self.rows.lock().unwrap().clone()
    }

    fn find_mut(
        rows: &mut [PendingMessage],
        message_id: Uuid,
    ) -> Result<&mut PendingMessage, CoreError> {
        rows.iter_mut()
            .find(|r| r.message.message_id == message_id)
            .ok_or_else(|| CoreError::Storage(format!("unknown outbox message {message_id}")))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn enqueue(
        &self,
        uow: Option<&dyn UnitOfWork>,
        messages: &[OutboxMessage],
    ) -> Result<(), CoreError> {
        let rows = Arc::clone(&self.rows);
        let staged: Vec<PendingMessage> = messages.iter().cloned().map(PendingMessage::new).collect();
        match uow {
            Some(uow) => {
                let memory = uow.as_any().downcast_ref::<MemoryUnitOfWork>().ok_or_else(|| {
                    CoreError::Storage(
                        "in-memory outbox store requires a MemoryUnitOfWork".to_string(),
                    )
                })?;
                memory.stage(move || {
                    rows.lock().unwrap().extend(staged);
                    Ok(())
                })?;
            }
            None => rows.lock().unwrap().extend(staged),
        }
        Ok(())
    }

    async fn pending(
        &self,
        batch_size: usize,
        max_attempts: u32,
    ) -> Result<Vec<PendingMessage>, CoreError> {
        let mut eligible: Vec<PendingMessage> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.is_eligible(max_attempts))
            .cloned()
            .collect();
        eligible.sort_by_key(|r| r.message.created_at);
        eligible.truncate(batch_size);
        Ok(eligible)
    }

    async fn record_success(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = Self::find_mut(&mut rows, message_id)?;
        row.attempts += 1;
        row.last_attempt_at = Some(at);
        row.dispatched_at = Some(at);
        Ok(())
    }

    async fn record_failure(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let row = Self::find_mut(&mut rows, message_id)?;
        row.attempts += 1;
        row.last_attempt_at = Some(at);
        row.last_error = Some(error.to_string());
        Ok(())
    }

    async fn pending_count(&self) -> Result<u64, CoreError> {
        let count = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.is_dispatched())
            .count();
        Ok(count as u64)
    }
}

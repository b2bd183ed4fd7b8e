//! Saga state and handler contracts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use causeway_core::error::CoreError;

/// Persistent state of one saga instance, keyed by correlation id.
///
/// `is_completed` is monotonic: it only ever transitions false → true, and a
/// completed instance is deleted from storage rather than resumed.
pub trait SagaState: Send + Sync + 'static {
    /// The correlation key this instance is stored under.
    fn correlation_id(&self) -> &str;

    /// Whether the process has finished.
    fn is_completed(&self) -> bool;

    /// Marks the process finished. Never unset.
    fn set_completed(&mut self);

    /// Updates the last-modified timestamp; called before every save.
    fn touch(&mut self, now: DateTime<Utc>);
}

/// What a saga handler decided for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaStep {
    /// State advanced; persist it and keep waiting for more messages.
    Continue,
    /// The process is finished; delete the instance.
    Completed,
    /// The message did not advance state; no persistence side effect.
    Ignore,
}

/// A long-running process definition.
pub trait Saga: Send + Sync + 'static {
    /// The state type persisted per instance.
    type State: SagaState;

    /// Stable saga name, used in logs.
    fn name(&self) -> &'static str;

    /// A fresh Active (not completed) instance for a starter message.
    fn initial_state(&self, correlation_id: String, now: DateTime<Utc>) -> Self::State;
}

/// One message type a saga reacts to. Implemented once per
/// `(saga, message)` pair; registration binds it into the descriptor table.
#[async_trait]
pub trait HandlesMessage<M: Send + Sync + 'static>: Saga {
    /// Advances the instance with one message.
    ///
    /// # Errors
    ///
    /// Errors propagate to the dispatching caller; no state is persisted for
    /// a failed handler.
    async fn handle(&self, state: &mut Self::State, message: &M) -> Result<SagaStep, CoreError>;
}

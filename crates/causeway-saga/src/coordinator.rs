//! Per-message saga coordination.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use causeway_core::clock::Clock;
use causeway_core::error::CoreError;

use crate::registry::SagaRegistry;

/// Drives every registered descriptor for an inbound message.
///
/// State handling is load-modify-save per descriptor: concurrent deliveries
/// for the same correlation id are not serialized here, so callers needing
/// strict per-instance ordering must add their own locking.
pub struct SagaCoordinator {
    registry: SagaRegistry,
    clock: Arc<dyn Clock>,
}

impl SagaCoordinator {
    /// Wires a coordinator over a finished registry.
    #[must_use]
    pub fn new(registry: SagaRegistry, clock: Arc<dyn Clock>) -> Self {
        Self { registry, clock }
    }

    /// Dispatches one typed message to every matching descriptor.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors; a correlation id that fails to
    /// resolve only skips its own descriptor.
    pub async fn publish<M: Send + Sync + 'static>(&self, message: &M) -> Result<(), CoreError> {
        self.dispatch(message, std::any::type_name::<M>()).await
    }

    /// Type-erased dispatch, used by the mediator's saga-trigger behavior.
    ///
    /// A message type with no registered descriptors is a no-op. Per
    /// descriptor: resolve the correlation id (empty counts as unresolved);
    /// unresolved on a non-starter logs and skips that descriptor only,
    /// unresolved on a starter generates a fresh id; then the descriptor
    /// loads/creates state and drives the saga's completion state machine.
    ///
    /// # Errors
    ///
    /// Propagates handler and store errors to the caller.
    pub async fn dispatch(
        &self,
        message: &(dyn Any + Send + Sync),
        message_name: &str,
    ) -> Result<(), CoreError> {
        let Some(handlers) = self.registry.handlers_for(message.type_id()) else {
            return Ok(());
        };

        for handler in handlers {
            let resolved = handler.resolve(message).filter(|id| !id.is_empty());
            let correlation_id = match resolved {
                Some(id) => id,
                None if handler.is_starter() => Uuid::new_v4().to_string(),
                None => {
                    warn!(
                        saga = handler.saga_name(),
                        message = message_name,
                        "no correlation id resolved; skipping descriptor"
                    );
                    continue;
                }
            };

            let disposition = handler
                .invoke(&correlation_id, message, self.clock.now())
                .await?;
            debug!(
                saga = handler.saga_name(),
                message = message_name,
                correlation_id = %correlation_id,
                ?disposition,
                "saga message dispatched"
            );
        }
        Ok(())
    }
}

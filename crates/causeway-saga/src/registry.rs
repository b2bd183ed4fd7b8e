//! Registration-time descriptor table.
//!
//! `add_saga` binds each `(saga, message)` pair into an erased handler
//! object capturing the saga, its typed store, the correlation resolver and
//! the starter flag. Dispatch is then a `TypeId` lookup plus a direct call,
//! semantically identical to a naive type switch, just without per-message
//! type inspection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use causeway_core::error::CoreError;

use crate::state::{HandlesMessage, Saga, SagaState, SagaStep};
use crate::store::SagaStore;

/// How one descriptor disposed of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaDisposition {
    /// No instance existed (non-starter), or the instance was already
    /// completed; the descriptor did nothing.
    Skipped,
    /// The handler looked at the message and chose not to advance state.
    Ignored,
    /// State advanced and was persisted.
    Continued,
    /// The process finished; the instance was deleted.
    Completed,
}

/// A `(saga, message)` binding with the type parameters erased.
#[async_trait]
pub(crate) trait ErasedSagaHandler: Send + Sync {
    fn saga_name(&self) -> &'static str;
    fn message_name(&self) -> &'static str;
    fn is_starter(&self) -> bool;

    /// Runs the bound correlation resolver against the message.
    fn resolve(&self, message: &dyn Any) -> Option<String>;

    /// The state-handling half of dispatch: load or create state, invoke the
    /// handler, persist or delete per its decision.
    async fn invoke(
        &self,
        correlation_id: &str,
        message: &(dyn Any + Send + Sync),
        now: DateTime<Utc>,
    ) -> Result<SagaDisposition, CoreError>;
}

struct TypedSagaHandler<SG, M>
where
    SG: HandlesMessage<M>,
    M: Send + Sync + 'static,
{
    saga: Arc<SG>,
    store: Arc<dyn SagaStore<SG::State>>,
    resolver: Box<dyn Fn(&M) -> Option<String> + Send + Sync>,
    starter: bool,
    message_name: &'static str,
    _message: PhantomData<fn(M)>,
}

#[async_trait]
impl<SG, M> ErasedSagaHandler for TypedSagaHandler<SG, M>
where
    SG: HandlesMessage<M>,
    M: Send + Sync + 'static,
{
    fn saga_name(&self) -> &'static str {
        self.saga.name()
    }

    fn message_name(&self) -> &'static str {
        self.message_name
    }

    fn is_starter(&self) -> bool {
        self.starter
    }

    fn resolve(&self, message: &dyn Any) -> Option<String> {
        message.downcast_ref::<M>().and_then(|m| (self.resolver)(m))
    }

    async fn invoke(
        &self,
        correlation_id: &str,
        message: &(dyn Any + Send + Sync),
        now: DateTime<Utc>,
    ) -> Result<SagaDisposition, CoreError> {
        let Some(message) = message.downcast_ref::<M>() else {
            return Err(CoreError::Configuration(format!(
                "saga {} received a message that is not a {}",
                self.saga.name(),
                self.message_name
            )));
        };

        let mut state = match self.store.find(correlation_id).await? {
            Some(state) if state.is_completed() => return Ok(SagaDisposition::Skipped),
            Some(state) => state,
            None if self.starter => self
                .saga
                .initial_state(correlation_id.to_string(), now),
            None => return Ok(SagaDisposition::Skipped),
        };

        match self.saga.handle(&mut state, message).await? {
            SagaStep::Completed => {
                state.set_completed();
                self.store.delete(correlation_id).await?;
                Ok(SagaDisposition::Completed)
            }
            SagaStep::Continue => {
                state.touch(now);
                self.store.save(&state).await?;
                Ok(SagaDisposition::Continued)
            }
            SagaStep::Ignore => Ok(SagaDisposition::Ignored),
        }
    }
}

/// Descriptor table keyed by message type.
#[derive(Default)]
pub struct SagaRegistry {
    handlers: HashMap<TypeId, Vec<Arc<dyn ErasedSagaHandler>>>,
}

impl SagaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a saga with its store; `configure` declares its message
    /// bindings via [`SagaConfig::starts_with`] and [`SagaConfig::handles`].
    pub fn add_saga<SG: Saga>(
        &mut self,
        saga: SG,
        store: Arc<dyn SagaStore<SG::State>>,
        configure: impl FnOnce(&mut SagaConfig<'_, SG>),
    ) {
        let mut config = SagaConfig {
            registry: self,
            saga: Arc::new(saga),
            store,
        };
        configure(&mut config);
    }

    pub(crate) fn handlers_for(
        &self,
        message_type: TypeId,
    ) -> Option<&[Arc<dyn ErasedSagaHandler>]> {
        self.handlers.get(&message_type).map(Vec::as_slice)
    }

    /// Number of registered message bindings across all sagas.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

/// Per-saga registration scope handed to the `add_saga` closure.
pub struct SagaConfig<'r, SG: Saga> {
    registry: &'r mut SagaRegistry,
    saga: Arc<SG>,
    store: Arc<dyn SagaStore<SG::State>>,
}

impl<SG: Saga> SagaConfig<'_, SG> {
    /// Binds a message type that may *begin* a new instance: if no state
    /// exists for the resolved id (or no id resolves), a fresh instance is
    /// created.
    pub fn starts_with<M>(
        &mut self,
        resolver: impl Fn(&M) -> Option<String> + Send + Sync + 'static,
    ) -> &mut Self
    where
        SG: HandlesMessage<M>,
        M: Send + Sync + 'static,
    {
        self.bind(resolver, true)
    }

    /// Binds a message type that only advances an *existing* instance.
    pub fn handles<M>(
        &mut self,
        resolver: impl Fn(&M) -> Option<String> + Send + Sync + 'static,
    ) -> &mut Self
    where
        SG: HandlesMessage<M>,
        M: Send + Sync + 'static,
    {
        self.bind(resolver, false)
    }

    fn bind<M>(
        &mut self,
        resolver: impl Fn(&M) -> Option<String> + Send + Sync + 'static,
        starter: bool,
    ) -> &mut Self
    where
        SG: HandlesMessage<M>,
        M: Send + Sync + 'static,
    {
        let handler = TypedSagaHandler {
            saga: Arc::clone(&self.saga),
            store: Arc::clone(&self.store),
            resolver: Box::new(resolver),
            starter,
            message_name: std::any::type_name::<M>(),
            _message: PhantomData,
        };
        self.registry
            .handlers
            .entry(TypeId::of::<M>())
            .or_default()
            .push(Arc::new(handler));
        self
    }
}

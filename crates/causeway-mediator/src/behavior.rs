//! Pipeline behavior contract and the exchange flowing through it.

use std::any::Any;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use causeway_core::error::CoreError;
use causeway_core::uow::UnitOfWork;

use crate::mediator::ErasedHandler;
use crate::request::ErasedRequest;

/// Type-erased handler response; `Mediator::send` downcasts it back.
pub type BoxedResponse = Box<dyn Any + Send>;

/// One in-flight request plus the pipeline-scoped state attached to it.
pub struct Exchange {
    request: Box<dyn ErasedRequest>,
    uow: Mutex<Option<Arc<dyn UnitOfWork>>>,
}

impl Exchange {
    pub(crate) fn new(request: Box<dyn ErasedRequest>) -> Self {
        Self {
            request,
            uow: Mutex::new(None),
        }
    }

    /// The erased request.
    #[must_use]
    pub fn request(&self) -> &dyn ErasedRequest {
        self.request.as_ref()
    }

    /// Attaches the unit of work the transaction behavior opened.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_unit_of_work(&self, uow: Arc<dyn UnitOfWork>) {
        *self.uow.lock().unwrap() = Some(uow);
    }

    /// Detaches the unit of work before commit/rollback.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear_unit_of_work(&self) {
        *self.uow.lock().unwrap() = None;
    }

    /// The active unit of work, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn unit_of_work(&self) -> Option<Arc<dyn UnitOfWork>> {
        self.uow.lock().unwrap().clone()
    }
}

/// One link in the pipeline around the handler. Behaviors run in
/// registration order, outermost first; each decides whether and when to
/// call `next`.
#[async_trait]
pub trait PipelineBehavior: Send + Sync {
    /// Wraps the rest of the chain.
    ///
    /// # Errors
    ///
    /// Errors short-circuit the chain and propagate outward unchanged unless a
    /// behavior's contract says otherwise.
    async fn handle(&self, exchange: &Exchange, next: Next<'_>)
    -> Result<BoxedResponse, CoreError>;
}

/// The remainder of the chain: the behaviors not yet run, ending at the
/// handler.
pub struct Next<'a> {
    behaviors: &'a [Arc<dyn PipelineBehavior>],
    handler: &'a dyn ErasedHandler,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        behaviors: &'a [Arc<dyn PipelineBehavior>],
        handler: &'a dyn ErasedHandler,
    ) -> Self {
        Self { behaviors, handler }
    }

    /// Invokes the next behavior, or the handler if none remain.
    ///
    /// # Errors
    ///
    /// Propagates whatever the inner chain returns.
    pub async fn run(self, exchange: &Exchange) -> Result<BoxedResponse, CoreError> {
        match self.behaviors.split_first() {
            Some((first, rest)) => {
                first
                    .handle(exchange, Next::new(rest, self.handler))
                    .await
            }
            None => self.handler.call(exchange).await,
        }
    }
}

//! The mediator: one handler per request type, resolved through a
//! `TypeId`-keyed table built at startup.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};
use crate::handler::{HandlerContext, RequestHandler};
use crate::request::Request;

/// A registered handler with its request type erased.
#[async_trait]
pub(crate) trait ErasedHandler: Send + Sync {
    async fn call(&self, exchange: &Exchange) -> Result<BoxedResponse, CoreError>;
}

struct TypedHandler<R: Request> {
    inner: Arc<dyn RequestHandler<R>>,
}

#[async_trait]
impl<R: Request> ErasedHandler for TypedHandler<R> {
    async fn call(&self, exchange: &Exchange) -> Result<BoxedResponse, CoreError> {
        let request = exchange
            .request()
            .as_any()
            .downcast_ref::<R>()
            .ok_or_else(|| {
                CoreError::Configuration(format!(
                    "handler for {} received a different request type",
                    R::name()
                ))
            })?;
        let ctx = match exchange.unit_of_work() {
            Some(uow) => HandlerContext::with_unit_of_work(uow),
            None => HandlerContext::empty(),
        };
        let response = self.inner.handle(request, &ctx).await?;
        Ok(Box::new(response))
    }
}

/// Builds a [`Mediator`]: register handlers and behaviors, then `build`.
#[derive(Default)]
pub struct MediatorBuilder {
    handlers: HashMap<TypeId, Box<dyn ErasedHandler>>,
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl MediatorBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `R`. Exactly one handler per request type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] if `R` already has a handler.
    pub fn register<R: Request>(
        mut self,
        handler: Arc<dyn RequestHandler<R>>,
    ) -> Result<Self, CoreError> {
        let previous = self
            .handlers
            .insert(TypeId::of::<R>(), Box::new(TypedHandler { inner: handler }));
        if previous.is_some() {
            return Err(CoreError::Configuration(format!(
                "a handler for {} is already registered",
                R::name()
            )));
        }
        Ok(self)
    }

    /// Appends a behavior. Behaviors wrap the handler in registration order:
    /// the first one added runs outermost.
    #[must_use]
    pub fn with_behavior(mut self, behavior: Arc<dyn PipelineBehavior>) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Finishes the build.
    #[must_use]
    pub fn build(self) -> Mediator {
        Mediator {
            handlers: self.handlers,
            behaviors: self.behaviors,
        }
    }
}

/// Routes each request to its single handler through the behavior chain.
pub struct Mediator {
    handlers: HashMap<TypeId, Box<dyn ErasedHandler>>,
    behaviors: Vec<Arc<dyn PipelineBehavior>>,
}

impl Mediator {
    /// Sends a request and returns the handler's typed response.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Configuration`] when no handler is registered
    /// for the request type; otherwise whatever the chain produced.
    pub async fn send<R: Request>(&self, request: R) -> Result<R::Response, CoreError> {
        let handler = self.handlers.get(&TypeId::of::<R>()).ok_or_else(|| {
            CoreError::Configuration(format!("no handler registered for {}", R::name()))
        })?;

        let exchange = Exchange::new(Box::new(request));
        let response = Next::new(&self.behaviors, handler.as_ref())
            .run(&exchange)
            .await?;

        response.downcast::<R::Response>().map(|b| *b).map_err(|_| {
            CoreError::Configuration(format!(
                "handler for {} produced an unexpected response type",
                R::name()
            ))
        })
    }
}

//! Request handler contract.

use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;
use causeway_core::uow::UnitOfWork;

use crate::request::Request;

/// Everything a handler can reach beyond the request itself. Today that is
/// the unit of work opened by the transaction behavior, which the handler
/// passes on to repository saves so event append and outbox enqueue commit
/// together.
#[derive(Clone)]
pub struct HandlerContext {
    uow: Option<Arc<dyn UnitOfWork>>,
}

impl HandlerContext {
    /// Context with no transaction scope (queries, or a pipeline without the
    /// transaction behavior).
    #[must_use]
    pub fn empty() -> Self {
        Self { uow: None }
    }

    /// Context carrying an open unit of work.
    #[must_use]
    pub fn with_unit_of_work(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow: Some(uow) }
    }

    /// The active unit of work, if the pipeline opened one.
    #[must_use]
    pub fn unit_of_work(&self) -> Option<&Arc<dyn UnitOfWork>> {
        self.uow.as_ref()
    }
}

/// Handles exactly one request type. The mediator enforces a single handler
/// per type at registration.
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync {
    /// Executes the request.
    ///
    /// # Errors
    ///
    /// Any [`CoreError`] propagates outward through the behavior chain
    /// unchanged.
    async fn handle(&self, request: &R, ctx: &HandlerContext) -> Result<R::Response, CoreError>;
}

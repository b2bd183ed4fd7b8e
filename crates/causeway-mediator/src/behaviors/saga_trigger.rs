//! Saga dispatch after successful commands.

use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;
use causeway_saga::coordinator::SagaCoordinator;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};
use crate::request::RequestKind;

/// Forwards a command to the saga coordinator once its handler has
/// succeeded. Queries and failed commands never reach the coordinator.
pub struct SagaTriggerBehavior {
    coordinator: Arc<SagaCoordinator>,
}

impl SagaTriggerBehavior {
    #[must_use]
    pub fn new(coordinator: Arc<SagaCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl PipelineBehavior for SagaTriggerBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        let response = next.run(exchange).await?;

        if exchange.request().request_kind() == RequestKind::Command {
            let request = exchange.request();
            self.coordinator
                .dispatch(request.as_any(), request.request_name())
                .await?;
        }

        Ok(response)
    }
}

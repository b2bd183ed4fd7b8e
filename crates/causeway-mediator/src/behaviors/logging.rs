//! Start/finish/duration logging around each request.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};

/// Logs request start, outcome and elapsed time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingBehavior;

#[async_trait]
impl PipelineBehavior for LoggingBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        let name = exchange.request().request_name();
        let kind = exchange.request().request_kind();
        debug!(request = name, ?kind, "request started");
        let started = Instant::now();

        let result = next.run(exchange).await;

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match &result {
            Ok(_) => info!(request = name, elapsed_ms, "request completed"),
            Err(e) => warn!(
                request = name,
                elapsed_ms,
                code = e.code(),
                error = %e,
                "request failed"
            ),
        }
        result
    }
}

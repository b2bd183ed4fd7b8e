//! Tracing span around each request.

use async_trait::async_trait;
use tracing::Instrument;

use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};

/// Wraps the rest of the chain in an `info_span` carrying the request name
/// and kind, so handler and store logs nest under one span per request.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetryBehavior;

#[async_trait]
impl PipelineBehavior for TelemetryBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        let span = tracing::info_span!(
            "request",
            name = exchange.request().request_name(),
            kind = ?exchange.request().request_kind(),
        );
        next.run(exchange).instrument(span).await
    }
}

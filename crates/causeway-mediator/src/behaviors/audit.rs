//! Audit trail for handled requests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use causeway_core::clock::Clock;
use causeway_core::error::CoreError;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};

/// How a request ended, as recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Failure(String),
}

/// One audit record, written after the request completes either way.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub request_name: String,
    pub payload: Value,
    pub outcome: AuditOutcome,
    pub occurred_at: DateTime<Utc>,
}

/// Receives audit entries. Implemented by the host application.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the entry cannot be recorded. The behavior
    /// logs such failures but never turns them into request failures.
    async fn record(&self, entry: AuditEntry) -> Result<(), CoreError>;
}

/// Records an audit entry for every request, successes and failures alike.
/// The original result always flows back to the caller unchanged.
pub struct AuditBehavior {
    sink: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
}

impl AuditBehavior {
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>, clock: Arc<dyn Clock>) -> Self {
        Self { sink, clock }
    }
}

#[async_trait]
impl PipelineBehavior for AuditBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        let result = next.run(exchange).await;

        let outcome = match &result {
            Ok(_) => AuditOutcome::Success,
            Err(error) => AuditOutcome::Failure(error.to_string()),
        };
        let entry = AuditEntry {
            request_name: exchange.request().request_name().to_string(),
            payload: exchange.request().audit_payload(),
            outcome,
            occurred_at: self.clock.now(),
        };
        if let Err(sink_error) = self.sink.record(entry).await {
            tracing::error!(error = %sink_error, "audit sink failed");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use causeway_core::error::CoreError;
    use causeway_test_support::FixedClock;

    use super::{AuditBehavior, AuditEntry, AuditOutcome, AuditSink};
    use crate::handler::{HandlerContext, RequestHandler};
    use crate::mediator::MediatorBuilder;
    use crate::request::{Request, RequestKind};

    struct RenameWidget {
        fail: bool,
    }

    impl Request for RenameWidget {
        type Response = ();

        fn kind() -> RequestKind {
            RequestKind::Command
        }

        fn name() -> &'static str {
            "RenameWidget"
        }

        fn audit_payload(&self) -> serde_json::Value {
            json!({ "fail": self.fail })
        }
    }

    struct RenameHandler;

    #[async_trait]
    impl RequestHandler<RenameWidget> for RenameHandler {
        async fn handle(
            &self,
            request: &RenameWidget,
            _ctx: &HandlerContext,
        ) -> Result<(), CoreError> {
            if request.fail {
                Err(CoreError::Storage("store offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn record(&self, entry: AuditEntry) -> Result<(), CoreError> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AuditSink for BrokenSink {
        async fn record(&self, _entry: AuditEntry) -> Result<(), CoreError> {
            Err(CoreError::Storage("audit table missing".to_string()))
        }
    }

    fn mediator(sink: Arc<dyn AuditSink>) -> crate::mediator::Mediator {
        let clock = FixedClock(Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap());
        MediatorBuilder::new()
            .register::<RenameWidget>(Arc::new(RenameHandler))
            .unwrap()
            .with_behavior(Arc::new(AuditBehavior::new(sink, Arc::new(clock))))
            .build()
    }

    #[tokio::test]
    async fn test_success_is_recorded_with_payload() {
        let sink = Arc::new(RecordingSink::default());
        let mediator = mediator(Arc::clone(&sink) as Arc<dyn AuditSink>);

        mediator.send(RenameWidget { fail: false }).await.unwrap();

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_name, "RenameWidget");
        assert_eq!(entries[0].payload, json!({ "fail": false }));
        assert_eq!(entries[0].outcome, AuditOutcome::Success);
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_still_returned() {
        let sink = Arc::new(RecordingSink::default());
        let mediator = mediator(Arc::clone(&sink) as Arc<dyn AuditSink>);

        let err = mediator.send(RenameWidget { fail: true }).await.unwrap_err();

        assert!(matches!(err, CoreError::Storage(_)));
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].outcome, AuditOutcome::Failure(_)));
    }

    #[tokio::test]
    async fn test_sink_failure_never_masks_the_result() {
        let mediator = mediator(Arc::new(BrokenSink));

        mediator.send(RenameWidget { fail: false }).await.unwrap();
    }
}

//! Unit-of-work lifecycle around command handlers.

use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;
use causeway_core::uow::UnitOfWorkFactory;

use crate::behavior::{BoxedResponse, Exchange, Next, PipelineBehavior};
use crate::request::RequestKind;

/// Opens a unit of work before a command handler runs, commits it when the
/// rest of the pipeline succeeds, and rolls it back when it fails. Queries
/// pass through without a unit of work.
pub struct TransactionBehavior {
    factory: Arc<dyn UnitOfWorkFactory>,
}

impl TransactionBehavior {
    #[must_use]
    pub fn new(factory: Arc<dyn UnitOfWorkFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl PipelineBehavior for TransactionBehavior {
    async fn handle(
        &self,
        exchange: &Exchange,
        next: Next<'_>,
    ) -> Result<BoxedResponse, CoreError> {
        if exchange.request().request_kind() != RequestKind::Command {
            return next.run(exchange).await;
        }

        let uow = self.factory.begin().await?;
        exchange.set_unit_of_work(Arc::clone(&uow));
        let result = next.run(exchange).await;
        exchange.clear_unit_of_work();

        match result {
            Ok(response) => {
                uow.commit().await?;
                Ok(response)
            }
            Err(error) => {
                if let Err(rollback_error) = uow.rollback().await {
                    tracing::error!(error = %rollback_error, "rollback failed");
                }
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use causeway_core::error::CoreError;
    use causeway_core::uow::{MemoryUnitOfWork, MemoryUnitOfWorkFactory};

    use super::TransactionBehavior;
    use crate::handler::{HandlerContext, RequestHandler};
    use crate::mediator::MediatorBuilder;
    use crate::request::{Request, RequestKind};

    struct Deposit {
        fail: bool,
    }

    impl Request for Deposit {
        type Response = ();

        fn kind() -> RequestKind {
            RequestKind::Command
        }

        fn name() -> &'static str {
            "Deposit"
        }
    }

    struct Balance;

    impl Request for Balance {
        type Response = bool;

        fn kind() -> RequestKind {
            RequestKind::Query
        }

        fn name() -> &'static str {
            "Balance"
        }
    }

    struct StagingHandler {
        applied: Arc<std::sync::Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RequestHandler<Deposit> for StagingHandler {
        async fn handle(&self, request: &Deposit, ctx: &HandlerContext) -> Result<(), CoreError> {
            let uow = ctx
                .unit_of_work()
                .ok_or_else(|| CoreError::Configuration("no unit of work".to_string()))?;
            let memory = uow
                .as_any()
                .downcast_ref::<MemoryUnitOfWork>()
                .ok_or_else(|| CoreError::Configuration("unexpected unit of work".to_string()))?;

            let applied = Arc::clone(&self.applied);
            memory.stage(move || {
                applied.lock().unwrap().push("deposit".to_string());
                Ok(())
            })?;

            if request.fail {
                Err(CoreError::Storage("ledger offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct BalanceHandler;

    #[async_trait]
    impl RequestHandler<Balance> for BalanceHandler {
        async fn handle(&self, _request: &Balance, ctx: &HandlerContext) -> Result<bool, CoreError> {
            Ok(ctx.unit_of_work().is_some())
        }
    }

    fn mediator(applied: Arc<std::sync::Mutex<Vec<String>>>) -> crate::mediator::Mediator {
        MediatorBuilder::new()
            .register::<Deposit>(Arc::new(StagingHandler { applied }))
            .unwrap()
            .register::<Balance>(Arc::new(BalanceHandler))
            .unwrap()
            .with_behavior(Arc::new(TransactionBehavior::new(Arc::new(
                MemoryUnitOfWorkFactory,
            ))))
            .build()
    }

    #[tokio::test]
    async fn test_command_success_commits_staged_work() {
        let applied = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mediator = mediator(Arc::clone(&applied));

        mediator.send(Deposit { fail: false }).await.unwrap();

        assert_eq!(applied.lock().unwrap().as_slice(), ["deposit"]);
    }

    #[tokio::test]
    async fn test_command_failure_rolls_back_staged_work() {
        let applied = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mediator = mediator(Arc::clone(&applied));

        let err = mediator.send(Deposit { fail: true }).await.unwrap_err();

        assert!(matches!(err, CoreError::Storage(_)));
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_query_runs_without_a_unit_of_work() {
        let applied = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mediator = mediator(applied);

        let saw_uow = mediator.send(Balance).await.unwrap();

        assert!(!saw_uow);
    }
}

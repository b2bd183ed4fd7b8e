//! `PostgreSQL` saga state store.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::PgPool;

use causeway_core::error::CoreError;
use causeway_saga::state::SagaState;
use causeway_saga::store::SagaStore;

use crate::storage_err;

/// Saga instances in the `causeway_saga_instances` table, one JSONB row per
/// live instance keyed by `(saga_name, correlation_id)`. Completed
/// instances are deleted, not kept.
pub struct PgSagaStore<S> {
    pool: PgPool,
    saga_name: String,
    _state: PhantomData<fn() -> S>,
}

impl<S> PgSagaStore<S> {
    /// Creates a store scoped to one saga's instances.
    #[must_use]
    pub fn new(pool: PgPool, saga_name: impl Into<String>) -> Self {
        Self {
            pool,
            saga_name: saga_name.into(),
            _state: PhantomData,
        }
    }
}

#[async_trait]
impl<S> SagaStore<S> for PgSagaStore<S>
where
    S: SagaState + Serialize + DeserializeOwned,
{
    async fn find(&self, correlation_id: &str) -> Result<Option<S>, CoreError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r"
            SELECT state FROM causeway_saga_instances
            WHERE saga_name = $1 AND correlation_id = $2
            ",
        )
        .bind(&self.saga_name)
        .bind(correlation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|(state,)| {
            serde_json::from_value(state).map_err(|e| CoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn save(&self, state: &S) -> Result<(), CoreError> {
        let payload =
            serde_json::to_value(state).map_err(|e| CoreError::Serialization(e.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO causeway_saga_instances
                (saga_name, correlation_id, state, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (saga_name, correlation_id)
            DO UPDATE SET state = EXCLUDED.state, updated_at = NOW()
            ",
        )
        .bind(&self.saga_name)
        .bind(state.correlation_id())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn delete(&self, correlation_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            r"
            DELETE FROM causeway_saga_instances
            WHERE saga_name = $1 AND correlation_id = $2
            ",
        )
        .bind(&self.saga_name)
        .bind(correlation_id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}

//! `PostgreSQL` outbox store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use causeway_core::error::CoreError;
use causeway_core::uow::UnitOfWork;
use causeway_outbox::message::{OutboxMessage, PendingMessage};
use causeway_outbox::store::OutboxStore;

use crate::storage_err;
use crate::uow::require_pg;

/// Outbox rows in the `causeway_outbox` table. Enqueue through the caller's
/// unit of work lands in the same transaction as the event append it
/// accompanies.
#[derive(Debug, Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct OutboxRow {
    message_id: Uuid,
    stream_id: Uuid,
    stream_version: i64,
    event_type: String,
    payload: serde_json::Value,
    destination: Option<String>,
    headers: serde_json::Value,
    created_at: DateTime<Utc>,
    attempts: i32,
    last_attempt_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxRow {
    fn into_pending(self) -> Result<PendingMessage, CoreError> {
        let headers: HashMap<String, String> = serde_json::from_value(self.headers)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(PendingMessage {
            message: OutboxMessage {
                message_id: self.message_id,
                stream_id: self.stream_id,
                stream_version: self.stream_version,
                event_type: self.event_type,
                payload: self.payload,
                destination: self.destination,
                headers,
                created_at: self.created_at,
            },
            attempts: self.attempts.unsigned_abs(),
            last_attempt_at: self.last_attempt_at,
            last_error: self.last_error,
            dispatched_at: self.dispatched_at,
        })
    }
}

impl PgOutboxStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn enqueue_on(
        conn: &mut PgConnection,
        messages: &[OutboxMessage],
    ) -> Result<(), CoreError> {
        for message in messages {
            let headers = serde_json::to_value(&message.headers)
                .map_err(|e| CoreError::Serialization(e.to_string()))?;
            sqlx::query(
                r"
                INSERT INTO causeway_outbox
                    (message_id, stream_id, stream_version, event_type,
                     payload, destination, headers, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(message.message_id)
            .bind(message.stream_id)
            .bind(message.stream_version)
            .bind(&message.event_type)
            .bind(&message.payload)
            .bind(message.destination.as_deref())
            .bind(headers)
            .bind(message.created_at)
            .execute(&mut *conn)
            .await
            .map_err(storage_err)?;
        }
        Ok(())
    }

    fn require_row(message_id: Uuid, rows_affected: u64) -> Result<(), CoreError> {
        if rows_affected == 0 {
            Err(CoreError::Storage(format!(
                "unknown outbox message {message_id}"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn enqueue(
        &self,
        uow: Option<&dyn UnitOfWork>,
        messages: &[OutboxMessage],
    ) -> Result<(), CoreError> {
        match uow {
            Some(uow) => {
                let pg = require_pg(uow)?;
                let mut guard = pg.transaction().await;
                let tx = guard.as_mut().ok_or_else(|| {
                    CoreError::Storage("unit of work already completed".to_string())
                })?;
                Self::enqueue_on(&mut **tx, messages).await
            }
            None => {
                let mut conn = self.pool.acquire().await.map_err(storage_err)?;
                Self::enqueue_on(&mut conn, messages).await
            }
        }
    }

    async fn pending(
        &self,
        batch_size: usize,
        max_attempts: u32,
    ) -> Result<Vec<PendingMessage>, CoreError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r"
            SELECT message_id, stream_id, stream_version, event_type,
                   payload, destination, headers, created_at,
                   attempts, last_attempt_at, last_error, dispatched_at
            FROM causeway_outbox
            WHERE dispatched_at IS NULL AND attempts < $1
            ORDER BY created_at, stream_version
            LIMIT $2
            ",
        )
        .bind(i64::from(max_attempts))
        .bind(i64::try_from(batch_size).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(OutboxRow::into_pending).collect()
    }

    async fn record_success(&self, message_id: Uuid, at: DateTime<Utc>) -> Result<(), CoreError> {
        let result = sqlx::query(
            r"
            UPDATE causeway_outbox
            SET attempts = attempts + 1, dispatched_at = $2, last_attempt_at = $2
            WHERE message_id = $1
            ",
        )
        .bind(message_id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Self::require_row(message_id, result.rows_affected())
    }

    async fn record_failure(
        &self,
        message_id: Uuid,
        at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(
            r"
            UPDATE causeway_outbox
            SET attempts = attempts + 1, last_attempt_at = $2, last_error = $3
            WHERE message_id = $1
            ",
        )
        .bind(message_id)
        .bind(at)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Self::require_row(message_id, result.rows_affected())
    }

    async fn pending_count(&self) -> Result<u64, CoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM causeway_outbox WHERE dispatched_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(count.unsigned_abs())
    }
}

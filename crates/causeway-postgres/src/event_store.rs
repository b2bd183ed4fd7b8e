//! `PostgreSQL` event store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use causeway_core::error::CoreError;
use causeway_core::event::EventEnvelope;
use causeway_core::store::EventStore;
use causeway_core::uow::UnitOfWork;

use crate::storage_err;
use crate::uow::require_pg;

/// Append-only event streams in the `causeway_events` table.
///
/// Appends run inside a transaction either way: the caller's unit of work
/// when one is passed, a self-opened one otherwise. A per-stream advisory
/// lock serializes concurrent appends so the head-version check is
/// authoritative; the `UNIQUE (stream_id, version)` constraint backs it up.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct EventRow {
    stream_id: Uuid,
    version: i64,
    event_type: String,
    payload: serde_json::Value,
    metadata: serde_json::Value,
    recorded_at: DateTime<Utc>,
}

impl EventRow {
    fn into_envelope(self) -> Result<EventEnvelope, CoreError> {
        let metadata: HashMap<String, String> = serde_json::from_value(self.metadata)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        Ok(EventEnvelope {
            stream_id: self.stream_id,
            version: self.version,
            event_type: self.event_type,
            payload: self.payload,
            metadata,
            recorded_at: self.recorded_at,
        })
    }
}

fn stream_lock_key(stream_id: Uuid) -> i64 {
    let b = stream_id.as_bytes();
    i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

impl PgEventStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append_on(
        conn: &mut PgConnection,
        stream_id: Uuid,
        expected_version: i64,
        envelopes: &[EventEnvelope],
    ) -> Result<(), CoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(stream_lock_key(stream_id))
            .execute(&mut *conn)
            .await
            .map_err(storage_err)?;

        let (actual,): (i64,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version), 0) FROM causeway_events WHERE stream_id = $1",
        )
        .bind(stream_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(storage_err)?;

        if actual != expected_version {
            return Err(CoreError::Concurrency {
                stream_id,
                expected: expected_version,
                actual,
            });
        }

        for envelope in envelopes {
            let metadata = serde_json::to_value(&envelope.metadata)
                .map_err(|e| CoreError::Serialization(e.to_string()))?;
            sqlx::query(
                r"
                INSERT INTO causeway_events
                    (stream_id, version, event_type, payload, metadata, recorded_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(envelope.stream_id)
            .bind(envelope.version)
            .bind(&envelope.event_type)
            .bind(&envelope.payload)
            .bind(metadata)
            .bind(envelope.recorded_at)
            .execute(&mut *conn)
            .await
            .map_err(storage_err)?;
        }
        tracing::debug!(
            stream_id = %stream_id,
            appended = envelopes.len(),
            head = expected_version + envelopes.len() as i64,
            "events appended"
        );
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(
        &self,
        uow: Option<&dyn UnitOfWork>,
        stream_id: Uuid,
        expected_version: i64,
        envelopes: &[EventEnvelope],
    ) -> Result<(), CoreError> {
        match uow {
            Some(uow) => {
                let pg = require_pg(uow)?;
                let mut guard = pg.transaction().await;
                let tx = guard.as_mut().ok_or_else(|| {
                    CoreError::Storage("unit of work already completed".to_string())
                })?;
                Self::append_on(&mut **tx, stream_id, expected_version, envelopes).await
            }
            None => {
                let mut tx = self.pool.begin().await.map_err(storage_err)?;
                Self::append_on(&mut tx, stream_id, expected_version, envelopes).await?;
                tx.commit().await.map_err(storage_err)
            }
        }
    }

    async fn read_stream(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<EventEnvelope>, CoreError> {
        let rows: Vec<EventRow> = sqlx::query_as(
            r"
            SELECT stream_id, version, event_type, payload, metadata, recorded_at
            FROM causeway_events
            WHERE stream_id = $1 AND version > $2
            ORDER BY version
            ",
        )
        .bind(stream_id)
        .bind(from_version)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(EventRow::into_envelope).collect()
    }
}

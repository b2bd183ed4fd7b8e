//! `PostgreSQL` idempotency inbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use causeway_core::error::CoreError;
use causeway_outbox::inbox::InboxStore;

use crate::storage_err;

/// Seen-message records in the `causeway_inbox` table. The composite
/// primary key on `(source, message_id)` is the idempotency gate; first
/// sight inserts, a duplicate hits `ON CONFLICT DO NOTHING`.
#[derive(Debug, Clone)]
pub struct PgInboxStore {
    pool: PgPool,
}

impl PgInboxStore {
    /// Creates a store over the given pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxStore for PgInboxStore {
    async fn try_ensure_processed(
        &self,
        source: &str,
        message_id: &str,
        hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO causeway_inbox (source, message_id, content_hash, received_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source, message_id) DO NOTHING
            ",
        )
        .bind(source)
        .bind(message_id)
        .bind(hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError> {
        let result = sqlx::query("DELETE FROM causeway_inbox WHERE received_at <= $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}

//! Idempotency inbox: dedup of inbound messages plus a retention cleaner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use causeway_core::clock::Clock;
use causeway_core::error::CoreError;

/// Durable store of seen inbound messages. Existence of the
/// `(source, message_id)` pair is the sole idempotency gate.
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// Records a message as seen.
    ///
    /// Returns `true` on first sight (caller processes the message) and
    /// `false` for a duplicate (caller skips it). A redelivery is never an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn try_ensure_processed(
        &self,
        source: &str,
        message_id: &str,
        hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError>;

    /// Deletes entries received at or before `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError>;
}

/// Hex-encoded SHA-256 of a message body, for the optional inbox hash column.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Clone)]
struct InboxRecord {
    received_at: DateTime<Utc>,
    hash: Option<String>,
}

/// In-memory inbox store.
#[derive(Debug, Default)]
pub struct InMemoryInboxStore {
    entries: Arc<Mutex<HashMap<(String, String), InboxRecord>>>,
}

impl InMemoryInboxStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained entries. Test/inspection helper.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Content hash recorded for a seen message, if any. Test/inspection
    /// helper mirroring the durable `content_hash` column.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn recorded_hash(&self, source: &str, message_id: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap()
            .get(&(source.to_string(), message_id.to_string()))
            .and_then(|record| record.hash.clone())
    }
}

#[async_trait]
impl InboxStore for InMemoryInboxStore {
    async fn try_ensure_processed(
        &self,
        source: &str,
        message_id: &str,
        hash: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut entries = self.entries.lock().unwrap();
        let key = (source.to_string(), message_id.to_string());
        if entries.contains_key(&key) {
            return Ok(false);
        }
        entries.insert(
            key,
            InboxRecord {
                received_at: now,
                hash: hash.map(str::to_string),
            },
        );
        Ok(true)
    }

    async fn purge(&self, cutoff: DateTime<Utc>) -> Result<u64, CoreError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, record| record.received_at > cutoff);
        Ok((before - entries.len()) as u64)
    }
}

/// Cleaner tuning knobs.
#[derive(Debug, Clone)]
pub struct InboxCleanerConfig {
    /// Wait between purge runs.
    pub interval: Duration,
    /// How long entries are retained before purging.
    pub retention: chrono::Duration,
}

impl Default for InboxCleanerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            retention: chrono::Duration::days(7),
        }
    }
}

/// Background task purging aged inbox entries on an interval.
pub struct InboxCleaner {
    store: Arc<dyn InboxStore>,
    config: InboxCleanerConfig,
    clock: Arc<dyn Clock>,
}

impl InboxCleaner {
    /// Wires a cleaner over an inbox store.
    #[must_use]
    pub fn new(store: Arc<dyn InboxStore>, config: InboxCleanerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// One purge pass with the configured retention window.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the store fails.
    pub async fn purge_once(&self) -> Result<u64, CoreError> {
        let cutoff = self.clock.now() - self.config.retention;
        self.store.purge(cutoff).await
    }

    /// Runs purge passes until `shutdown` fires. Failures are logged and the
    /// loop continues on the next interval.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "inbox cleaner started"
        );
        loop {
            match self.purge_once().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "inbox entries purged"),
                Err(e) => error!(error = %e, "inbox purge failed"),
            }
            tokio::select! {
                _ = shutdown.recv() => break,
                () = tokio::time::sleep(self.config.interval) => {}
            }
        }
        info!("inbox cleaner stopped");
    }
}

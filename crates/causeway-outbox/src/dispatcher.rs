//! Background dispatcher draining the outbox to publishers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, error, info, warn};

use causeway_core::clock::Clock;
use causeway_core::error::CoreError;

use crate::publisher::PublisherRegistry;
use crate::store::OutboxStore;

/// Dispatcher tuning knobs.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Idle wait between polls when the outbox is empty.
    pub poll_interval: Duration,
    /// Maximum messages fetched per tick.
    pub batch_size: usize,
    /// Attempts after which a message is left stalled for operators.
    pub max_attempts: u32,
    /// Publisher name used when a message names no destination.
    pub default_publisher: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 50,
            max_attempts: 5,
            default_publisher: None,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Rows fetched from the store.
    pub fetched: usize,
    /// Rows delivered and marked dispatched.
    pub published: usize,
    /// Rows that recorded a failed attempt (including unroutable ones).
    pub failed: usize,
}

/// Single-instance poll/publish/record loop.
///
/// Running two dispatcher instances is safe for correctness (attempt
/// accounting is per row) but may duplicate external publishes under race;
/// no leader election is provided.
pub struct OutboxDispatcher {
    store: Arc<dyn OutboxStore>,
    publishers: PublisherRegistry,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
}

impl OutboxDispatcher {
    /// Wires a dispatcher over a store and a set of publishers.
    #[must_use]
    pub fn new(
        store: Arc<dyn OutboxStore>,
        publishers: PublisherRegistry,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publishers,
            config,
            clock,
        }
    }

    /// Fetches one pending batch and attempts delivery for each message.
    /// Per-message failures are recorded, never propagated; only store
    /// access failures abort the tick.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the outbox store itself fails.
    pub async fn tick(&self) -> Result<TickSummary, CoreError> {
        let batch = self
            .store
            .pending(self.config.batch_size, self.config.max_attempts)
            .await?;
        let mut summary = TickSummary {
            fetched: batch.len(),
            published: 0,
            failed: 0,
        };

        for pending in &batch {
            let message_id = pending.message.message_id;
            let now = self.clock.now();

            let Some(publisher) = self.publishers.resolve(
                pending.message.destination.as_deref(),
                self.config.default_publisher.as_deref(),
            ) else {
                warn!(
                    %message_id,
                    destination = pending.message.destination.as_deref().unwrap_or("<none>"),
                    "no publisher resolved for outbox message"
                );
                self.store
                    .record_failure(message_id, now, "no publisher resolved")
                    .await?;
                summary.failed += 1;
                continue;
            };

            match publisher.publish(pending).await {
                Ok(()) => {
                    self.store.record_success(message_id, now).await?;
                    summary.published += 1;
                }
                Err(e) => {
                    warn!(
                        %message_id,
                        publisher = publisher.name(),
                        attempt = pending.attempts + 1,
                        error = %e,
                        "outbox publish failed"
                    );
                    self.store
                        .record_failure(message_id, now, &e.to_string())
                        .await?;
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Runs the dispatch loop until `shutdown` fires.
    ///
    /// Sleeps `poll_interval` after an empty batch; a failed tick is logged
    /// and the loop continues after the same delay; a transient error never
    /// terminates the loop. Shutdown is honored between ticks, leaving no
    /// partially recorded outcome.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "outbox dispatcher started"
        );
        loop {
            let idle = match self.tick().await {
                Ok(summary) => {
                    if summary.fetched > 0 {
                        debug!(
                            fetched = summary.fetched,
                            published = summary.published,
                            failed = summary.failed,
                            "outbox tick"
                        );
                    }
                    summary.fetched == 0
                }
                Err(e) => {
                    error!(error = %e, "outbox dispatch tick failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                }
            } else {
                match shutdown.try_recv() {
                    Err(TryRecvError::Empty) => {}
                    _ => break,
                }
            }
        }
        info!("outbox dispatcher stopped");
    }
}

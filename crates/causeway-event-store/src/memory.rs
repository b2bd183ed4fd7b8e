//! In-memory event store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use causeway_core::error::CoreError;
use causeway_core::event::EventEnvelope;
use causeway_core::store::EventStore;
use causeway_core::uow::{MemoryUnitOfWork, UnitOfWork};

/// Event store backed by a process-local map of streams. The concurrency
/// check runs eagerly at append time; when a [`MemoryUnitOfWork`] is passed,
/// it runs again inside the staged write, so a scope that lost the race
/// after staging fails at commit instead of writing a duplicate version.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: Arc<Mutex<HashMap<Uuid, Vec<EventEnvelope>>>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Head version of a stream: 0 when the stream does not exist.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn head_version(&self, stream_id: Uuid) -> i64 {
        self.streams
            .lock()
            .unwrap()
            .get(&stream_id)
            .and_then(|events| events.last())
            .map_or(0, |envelope| envelope.version)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        uow: Option<&dyn UnitOfWork>,
        stream_id: Uuid,
        expected_version: i64,
        envelopes: &[EventEnvelope],
    ) -> Result<(), CoreError> {
        if envelopes.is_empty() {
            return Ok(());
        }

        let actual = self.head_version(stream_id);
        if actual != expected_version {
            return Err(CoreError::Concurrency {
                stream_id,
                expected: expected_version,
                actual,
            });
        }

        let streams = Arc::clone(&self.streams);
        let staged = envelopes.to_vec();
        match uow {
            Some(uow) => {
                let memory = uow.as_any().downcast_ref::<MemoryUnitOfWork>().ok_or_else(|| {
                    CoreError::Storage(
                        "in-memory event store requires a MemoryUnitOfWork".to_string(),
                    )
                })?;
                memory.stage(move || {
                    let mut streams = streams.lock().unwrap();
                    // Another scope may have committed between stage and
                    // commit, so the check must run again here.
                    let actual = streams
                        .get(&stream_id)
                        .and_then(|events| events.last())
                        .map_or(0, |envelope| envelope.version);
                    if actual != expected_version {
                        return Err(CoreError::Concurrency {
                            stream_id,
                            expected: expected_version,
                            actual,
                        });
                    }
                    streams.entry(stream_id).or_default().extend(staged);
                    Ok(())
                })?;
            }
            None => {
                streams
                    .lock()
                    .unwrap()
                    .entry(stream_id)
                    .or_default()
                    .extend(staged);
            }
        }
        Ok(())
    }

    async fn read_stream(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<EventEnvelope>, CoreError> {
        let streams = self.streams.lock().unwrap();
        Ok(streams
            .get(&stream_id)
            .map(|events| {
                events
                    .iter()
                    .filter(|envelope| envelope.version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

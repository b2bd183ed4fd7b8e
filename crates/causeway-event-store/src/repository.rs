//! Event-sourced repository: replay on load, append + outbox enqueue on save.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use causeway_core::aggregate::Aggregate;
use causeway_core::clock::Clock;
use causeway_core::error::CoreError;
use causeway_core::event::{DomainEvent, EventEnvelope};
use causeway_core::store::EventStore;
use causeway_core::uow::UnitOfWork;
use causeway_outbox::message::OutboxMessage;
use causeway_outbox::store::OutboxStore;

/// Loads aggregates by replaying their stream and persists them by appending
/// the pending events plus, when an outbox store is wired in, one outbox
/// message per event whose [`DomainEvent::destination`] is set, in the same
/// unit of work as the append.
pub struct EventSourcedRepository<A: Aggregate> {
    store: Arc<dyn EventStore>,
    outbox: Option<Arc<dyn OutboxStore>>,
    clock: Arc<dyn Clock>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> EventSourcedRepository<A> {
    /// Creates a repository without outbox wiring: saves append events only.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            outbox: None,
            clock,
            _aggregate: PhantomData,
        }
    }

    /// Enables outbox enqueueing for integration events.
    #[must_use]
    pub fn with_outbox(mut self, outbox: Arc<dyn OutboxStore>) -> Self {
        self.outbox = Some(outbox);
        self
    }

    /// Reconstitutes the aggregate with the given id by replaying its full
    /// stream. An empty stream yields a fresh version-0 instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if a stored event cannot be
    /// decoded, or [`CoreError::Storage`] if the stream read fails.
    pub async fn get(&self, id: Uuid) -> Result<A, CoreError> {
        let envelopes = self.store.read_stream(id, 0).await?;
        let mut events = Vec::with_capacity(envelopes.len());
        for envelope in &envelopes {
            events.push(A::Event::from_payload(
                &envelope.event_type,
                &envelope.payload,
            )?);
        }
        let mut aggregate = A::new(id);
        aggregate.replay(events);
        Ok(aggregate)
    }

    /// Drains the aggregate's pending events and persists them.
    ///
    /// A save with nothing pending returns immediately; the valid no-op of
    /// an idempotent command retry. Otherwise the expected version is
    /// `version - pending count`, the envelopes carry the versions above it,
    /// and each event with a destination enqueues exactly one outbox message
    /// (`stream_version` = the event's version) into the same unit of work.
    ///
    /// # Errors
    ///
    /// Concurrency failures from the event store propagate unchanged; the
    /// caller reloads and retries. Also returns [`CoreError::Storage`] for
    /// backend failures.
    pub async fn save(
        &self,
        uow: Option<&dyn UnitOfWork>,
        aggregate: &mut A,
    ) -> Result<(), CoreError> {
        let pending = aggregate.take_uncommitted_events();
        if pending.is_empty() {
            return Ok(());
        }

        let stream_id = aggregate.id();
        let expected_version = aggregate.version() - pending.len() as i64;
        let now = self.clock.now();

        let mut envelopes = Vec::with_capacity(pending.len());
        let mut messages = Vec::new();
        for (offset, event) in pending.iter().enumerate() {
            let version = expected_version + 1 + offset as i64;
            envelopes.push(EventEnvelope {
                stream_id,
                version,
                event_type: event.event_type().to_string(),
                payload: event.to_payload(),
                metadata: HashMap::new(),
                recorded_at: now,
            });
            if let Some(destination) = event.destination() {
                messages.push(OutboxMessage {
                    message_id: Uuid::new_v4(),
                    stream_id,
                    stream_version: version,
                    event_type: event.event_type().to_string(),
                    payload: event.to_payload(),
                    destination: Some(destination.to_string()),
                    headers: HashMap::new(),
                    created_at: now,
                });
            }
        }

        self.store
            .append(uow, stream_id, expected_version, &envelopes)
            .await?;

        if let Some(outbox) = &self.outbox {
            if !messages.is_empty() {
                outbox.enqueue(uow, &messages).await?;
            }
        }

        debug!(
            %stream_id,
            appended = envelopes.len(),
            enqueued = messages.len(),
            "aggregate saved"
        );
        Ok(())
    }
}

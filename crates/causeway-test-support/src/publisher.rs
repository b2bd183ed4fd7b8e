//! Publisher doubles for outbox and end-to-end tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use causeway_core::error::CoreError;
use causeway_outbox::message::PendingMessage;
use causeway_outbox::publisher::Publisher;

/// A publisher that records every message it is handed and always succeeds.
pub struct RecordingPublisher {
    name: String,
    published: Mutex<Vec<PendingMessage>>,
}

impl RecordingPublisher {
    /// Creates a recording publisher with the given registry name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn published(&self) -> Vec<PendingMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, message: &PendingMessage) -> Result<(), CoreError> {
        self.published.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// A publisher that fails its first `failures` calls and succeeds afterwards.
/// The standard double for at-least-once delivery tests.
pub struct FailingPublisher {
    name: String,
    failures: u32,
    calls: AtomicU32,
}

impl FailingPublisher {
    /// Creates a publisher that fails the first `failures` publishes.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: u32) -> Self {
        Self {
            name: name.into(),
            failures,
            calls: AtomicU32::new(0),
        }
    }

    /// Total publish calls seen, failed and successful.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for FailingPublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, _message: &PendingMessage) -> Result<(), CoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(CoreError::Publish("simulated publish failure".to_string()))
        } else {
            Ok(())
        }
    }
}

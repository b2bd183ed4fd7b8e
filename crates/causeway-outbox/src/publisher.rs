//! Publisher port and named registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use causeway_core::error::CoreError;

use crate::message::PendingMessage;

/// A named transport the dispatcher can hand messages to. Concrete broker
/// clients live outside the core; they implement this.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Registry name, matched against a message's `destination`.
    fn name(&self) -> &str;

    /// Delivers one message. A returned error counts as a failed attempt;
    /// delivery is at-least-once, so implementations may be re-invoked for a
    /// message that was already sent but not recorded.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Publish`] when delivery fails.
    async fn publish(&self, message: &PendingMessage) -> Result<(), CoreError>;
}

/// Publishers keyed by name.
#[derive(Default)]
pub struct PublisherRegistry {
    publishers: HashMap<String, Arc<dyn Publisher>>,
}

impl PublisherRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a publisher under its own name, replacing any previous one
    /// with the same name.
    pub fn register(&mut self, publisher: Arc<dyn Publisher>) {
        self.publishers
            .insert(publisher.name().to_string(), publisher);
    }

    /// Resolution order: the message's destination, then the configured
    /// default name, then the sole registered publisher if exactly one
    /// exists. `None` means the message cannot be routed.
    #[must_use]
    pub fn resolve(
        &self,
        destination: Option<&str>,
        default: Option<&str>,
    ) -> Option<Arc<dyn Publisher>> {
        destination
            .and_then(|name| self.publishers.get(name))
            .or_else(|| default.and_then(|name| self.publishers.get(name)))
            .or_else(|| {
                if self.publishers.len() == 1 {
                    self.publishers.values().next()
                } else {
                    None
                }
            })
            .cloned()
    }

    /// Number of registered publishers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

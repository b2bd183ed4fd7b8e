//! Outbox message types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The write side of an outbox row: what the repository enqueues alongside an
/// appended integration event. Created 1:1 with the event that opted into
/// integration messaging; `stream_version` is unique per `stream_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    /// Unique message identifier.
    pub message_id: Uuid,
    /// Stream of the event that produced this message.
    pub stream_id: Uuid,
    /// Version of that event within its stream.
    pub stream_version: i64,
    /// Event type name.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Publisher the dispatcher should route to, if the event named one.
    pub destination: Option<String>,
    /// Free-form transport headers.
    pub headers: HashMap<String, String>,
    /// When the message was enqueued.
    pub created_at: DateTime<Utc>,
}

/// The read side of an outbox row: the message plus its delivery accounting.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    /// The enqueued message.
    pub message: OutboxMessage,
    /// Number of delivery attempts so far.
    pub attempts: u32,
    /// When the last attempt ran.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Error text from the last failed attempt, for operator inspection.
    pub last_error: Option<String>,
    /// Set once the message was delivered; dispatched messages are never
    /// retried.
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl PendingMessage {
    /// Wraps a freshly enqueued message with zeroed delivery accounting.
    #[must_use]
    pub fn new(message: OutboxMessage) -> Self {
        Self {
            message,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
            dispatched_at: None,
        }
    }

    /// Whether the message was delivered.
    #[must_use]
    pub fn is_dispatched(&self) -> bool {
        self.dispatched_at.is_some()
    }

    /// Whether the dispatcher should still pick this message up.
    #[must_use]
    pub fn is_eligible(&self, max_attempts: u32) -> bool {
        !self.is_dispatched() && self.attempts < max_attempts
    }
}

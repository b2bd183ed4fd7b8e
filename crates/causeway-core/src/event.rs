//! Domain event abstractions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Trait that all domain events implement.
///
/// The trait doubles as the serializer contract: `event_type` + `to_payload`
/// serialize, `from_payload` deserializes. Every committed event type must
/// round-trip through these three.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;

    /// Reconstructs an event from its type name and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] for an unknown type name or a
    /// payload that does not match it.
    fn from_payload(event_type: &str, payload: &serde_json::Value) -> Result<Self, CoreError>
    where
        Self: Sized;

    /// The integration predicate: an event produces exactly one outbox
    /// message if and only if this returns `Some(destination)`. The
    /// destination names the publisher the dispatcher should route to.
    ///
    /// Defaults to `None` (purely internal event, no outbox row).
    fn destination(&self) -> Option<&str> {
        None
    }
}

/// One committed event as stored in a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Stream (aggregate) identity.
    pub stream_id: Uuid,
    /// 1-based, strictly increasing position within the stream.
    pub version: i64,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Free-form metadata (correlation ids, tenant, ...).
    pub metadata: HashMap<String, String>,
    /// When the event was committed.
    pub recorded_at: DateTime<Utc>,
}

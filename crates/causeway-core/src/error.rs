//! Common error type.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type shared across the Causeway crates.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Optimistic concurrency conflict on an event stream append.
    #[error(
        "concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}"
    )]
    Concurrency {
        /// The stream that had the conflict.
        stream_id: Uuid,
        /// The version the caller expected to append after.
        expected: i64,
        /// The actual head version of the stream.
        actual: i64,
    },

    /// One or more request validators rejected the request.
    /// The handler was never invoked.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// The authorization check for the request failed.
    #[error("authorization denied: {0}")]
    Authorization(String),

    /// An event payload could not be serialized or deserialized.
    /// Fatal for the enclosing append or replay.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A storage backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// A registration or wiring mistake (missing handler, duplicate
    /// registration, unresolvable publisher).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A publisher failed to deliver an outbox message.
    #[error("publish error: {0}")]
    Publish(String),
}

impl CoreError {
    /// Stable machine-readable code for the error variant, for callers that
    /// surface failures as structured results rather than exceptions.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Concurrency { .. } => "concurrency_conflict",
            Self::Validation(_) => "validation_failed",
            Self::Authorization(_) => "authorization_denied",
            Self::Serialization(_) => "serialization_error",
            Self::Storage(_) => "storage_error",
            Self::Configuration(_) => "configuration_error",
            Self::Publish(_) => "publish_error",
        }
    }
}

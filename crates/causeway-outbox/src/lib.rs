//! Causeway outbox: reliable integration messaging.
//!
//! Implements the transactional outbox pattern: integration messages are
//! persisted in the same unit of work as the events that produced them, then
//! drained to named publishers by a background dispatcher with bounded
//! retries. The inbox half deduplicates inbound messages so at-least-once
//! redelivery is safe for consumers.

pub mod dispatcher;
pub mod inbox;
pub mod message;
pub mod publisher;
pub mod store;

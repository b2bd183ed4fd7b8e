//! The stock pipeline behaviors.
//!
//! Typical registration order, outermost first: logging, telemetry,
//! validation, authorization, audit, transaction, saga trigger.

pub mod audit;
pub mod authorization;
pub mod logging;
pub mod saga_trigger;
pub mod telemetry;
pub mod transaction;
pub mod validation;

pub use audit::{AuditBehavior, AuditEntry, AuditOutcome, AuditSink};
pub use authorization::{AuthorizationBehavior, Authorizer};
pub use logging::LoggingBehavior;
pub use saga_trigger::SagaTriggerBehavior;
pub use telemetry::TelemetryBehavior;
pub use transaction::TransactionBehavior;
pub use validation::{ValidationBehavior, Validator, ValidatorRegistry};

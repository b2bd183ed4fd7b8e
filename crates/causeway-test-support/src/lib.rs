//! Shared test doubles for the Causeway workspace.

mod clock;
mod publisher;

pub use clock::{FixedClock, SteppingClock};
pub use publisher::{FailingPublisher, RecordingPublisher};

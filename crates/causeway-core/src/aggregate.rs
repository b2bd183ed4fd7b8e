//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots whose state is derived purely by folding their
/// event history.
///
/// Implementors keep three fields by hand: the id, the version (count of all
/// events folded so far, committed and pending), and the pending-event list.
/// Command methods enforce domain invariants first and only then call
/// [`Aggregate::record`]; an invariant violation is raised before any event
/// exists, so partial application never occurs.
pub trait Aggregate: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// A blank instance at version 0 with no history applied.
    fn new(id: Uuid) -> Self
    where
        Self: Sized;

    /// Returns the aggregate (stream) identifier.
    fn id(&self) -> Uuid;

    /// Returns the current version: the number of events folded so far.
    fn version(&self) -> i64;

    /// Overwrites the version counter. Only `record`/`replay` call this.
    fn set_version(&mut self, version: i64);

    /// Folds one event into in-memory state. Pure state transition: no
    /// recording, no version bookkeeping.
    fn apply(&mut self, event: &Self::Event);

    /// Events produced by command handling that have not been persisted yet.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Mutable access to the pending list, for the provided methods below.
    fn uncommitted_events_mut(&mut self) -> &mut Vec<Self::Event>;

    /// Folds a new event into state, appends it to the pending list and
    /// advances the version.
    fn record(&mut self, event: Self::Event)
    where
        Self: Sized,
    {
        self.apply(&event);
        let next = self.version() + 1;
        self.set_version(next);
        self.uncommitted_events_mut().push(event);
    }

    /// Folds historical events into state and advances the version without
    /// touching the pending list. Used during reconstitution.
    fn replay<I>(&mut self, history: I)
    where
        Self: Sized,
        I: IntoIterator<Item = Self::Event>,
    {
        for event in history {
            self.apply(&event);
            let next = self.version() + 1;
            self.set_version(next);
        }
    }

    /// Returns and clears the pending list. Called exactly once per save.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>
    where
        Self: Sized,
    {
        std::mem::take(self.uncommitted_events_mut())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::Aggregate;
    use crate::error::CoreError;
    use crate::event::DomainEvent;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum CounterEvent {
        Incremented { by: i64 },
    }

    impl DomainEvent for CounterEvent {
        fn event_type(&self) -> &'static str {
            "counter.incremented"
        }

        fn to_payload(&self) -> serde_json::Value {
            serde_json::to_value(self).expect("CounterEvent serialization is infallible")
        }

        fn from_payload(
            _event_type: &str,
            payload: &serde_json::Value,
        ) -> Result<Self, CoreError> {
            serde_json::from_value(payload.clone())
                .map_err(|e| CoreError::Serialization(e.to_string()))
        }
    }

    struct Counter {
        id: Uuid,
        version: i64,
        total: i64,
        pending: Vec<CounterEvent>,
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;

        fn new(id: Uuid) -> Self {
            Self {
                id,
                version: 0,
                total: 0,
                pending: Vec::new(),
            }
        }

        fn id(&self) -> Uuid {
            self.id
        }

        fn version(&self) -> i64 {
            self.version
        }

        fn set_version(&mut self, version: i64) {
            self.version = version;
        }

        fn apply(&mut self, event: &Self::Event) {
            match event {
                CounterEvent::Incremented { by } => self.total += by,
            }
        }

        fn uncommitted_events(&self) -> &[Self::Event] {
            &self.pending
        }

        fn uncommitted_events_mut(&mut self) -> &mut Vec<Self::Event> {
            &mut self.pending
        }
    }

    #[test]
    fn test_record_folds_state_and_advances_version() {
        let mut counter = Counter::new(Uuid::new_v4());

        counter.record(CounterEvent::Incremented { by: 2 });
        counter.record(CounterEvent::Incremented { by: 3 });

        assert_eq!(counter.total, 5);
        assert_eq!(counter.version(), 2);
        assert_eq!(counter.uncommitted_events().len(), 2);
    }

    #[test]
    fn test_replay_does_not_touch_pending_list() {
        let mut counter = Counter::new(Uuid::new_v4());

        counter.replay(vec![
            CounterEvent::Incremented { by: 1 },
            CounterEvent::Incremented { by: 4 },
        ]);

        assert_eq!(counter.total, 5);
        assert_eq!(counter.version(), 2);
        assert!(counter.uncommitted_events().is_empty());
    }

    #[test]
    fn test_take_uncommitted_events_drains_exactly_once() {
        let mut counter = Counter::new(Uuid::new_v4());
        counter.record(CounterEvent::Incremented { by: 1 });

        let drained = counter.take_uncommitted_events();
        assert_eq!(drained.len(), 1);
        assert!(counter.take_uncommitted_events().is_empty());
        // Version reflects the folded event even after draining.
        assert_eq!(counter.version(), 1);
    }
}

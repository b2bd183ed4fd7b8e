//! Saga state store contract and in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use causeway_core::error::CoreError;

use crate::state::SagaState;

/// Typed storage for one saga's instances.
#[async_trait]
pub trait SagaStore<S: SagaState>: Send + Sync {
    /// Loads the instance stored under `correlation_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn find(&self, correlation_id: &str) -> Result<Option<S>, CoreError>;

    /// Inserts or replaces the instance under its correlation id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn save(&self, state: &S) -> Result<(), CoreError>;

    /// Removes the instance; deleting an absent id is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] for backend failures.
    async fn delete(&self, correlation_id: &str) -> Result<(), CoreError>;
}

/// In-memory saga store.
#[derive(Debug, Default)]
pub struct InMemorySagaStore<S> {
    states: Mutex<HashMap<String, S>>,
}

impl<S: SagaState + Clone> InMemorySagaStore<S> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live instances. Test/inspection helper.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    /// Whether the store holds no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<S: SagaState + Clone> SagaStore<S> for InMemorySagaStore<S> {
    async fn find(&self, correlation_id: &str) -> Result<Option<S>, CoreError> {
        Ok(self.states.lock().unwrap().get(correlation_id).cloned())
    }

    async fn save(&self, state: &S) -> Result<(), CoreError> {
        self.states
            .lock()
            .unwrap()
            .insert(state.correlation_id().to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, correlation_id: &str) -> Result<(), CoreError> {
        self.states.lock().unwrap().remove(correlation_id);
        Ok(())
    }
}

//! Unit-of-work contract.
//!
//! The unit of work is the one deliberately shared mutable resource in the
//! core: it is what lets an event append and its outbox enqueue commit
//! atomically. It is an explicit context object passed down the call chain
//! (repository, event store, outbox store all take the same handle), never
//! thread-local state. One unit of work is scoped to one logical command and
//! must not be shared across concurrently executing requests.

use std::any::Any;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CoreError;

/// A single atomic scope over one or more store operations.
///
/// Backends downcast via [`UnitOfWork::as_any`] to reach their native
/// transaction handle.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Makes every operation staged in this scope durable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the scope was already completed or
    /// the backend commit fails.
    async fn commit(&self) -> Result<(), CoreError>;

    /// Discards every operation staged in this scope.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the scope was already completed or
    /// the backend rollback fails.
    async fn rollback(&self) -> Result<(), CoreError>;

    /// Downcasting hook for store implementations.
    fn as_any(&self) -> &dyn Any;
}

/// Creates unit-of-work scopes. The transaction pipeline behavior begins one
/// per command.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    /// Opens a new scope.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the backend cannot open one.
    async fn begin(&self) -> Result<Arc<dyn UnitOfWork>, CoreError>;
}

type StagedOp = Box<dyn FnOnce() -> Result<(), CoreError> + Send>;

enum MemoryUowState {
    Open(Vec<StagedOp>),
    Committed,
    RolledBack,
}

/// In-process unit of work: stores stage their writes as fallible closures
/// which run in staging order on commit and are dropped on rollback. A store
/// may re-run its guards inside the closure, so a commit can fail the same
/// way an eager write would; commit stops at the first failing op.
pub struct MemoryUnitOfWork {
    state: Mutex<MemoryUowState>,
}

impl MemoryUnitOfWork {
    /// Opens a fresh in-process scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryUowState::Open(Vec::new())),
        }
    }

    /// Stages a write to run at commit time.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Storage`] if the scope was already completed.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn stage(
        &self,
        op: impl FnOnce() -> Result<(), CoreError> + Send + 'static,
    ) -> Result<(), CoreError> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            MemoryUowState::Open(ops) => {
                ops.push(Box::new(op));
                Ok(())
            }
            _ => Err(CoreError::Storage(
                "unit of work already completed".to_string(),
            )),
        }
    }

    fn complete(&self, next: MemoryUowState) -> Result<Vec<StagedOp>, CoreError> {
        let mut state = self.state.lock().unwrap();
        match std::mem::replace(&mut *state, next) {
            MemoryUowState::Open(ops) => Ok(ops),
            other => {
                // Restore so the observable state stays Committed/RolledBack.
                *state = other;
                Err(CoreError::Storage(
                    "unit of work already completed".to_string(),
                ))
            }
        }
    }
}

impl Default for MemoryUnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(&self) -> Result<(), CoreError> {
        let ops = self.complete(MemoryUowState::Committed)?;
        for op in ops {
            op()?;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), CoreError> {
        self.complete(MemoryUowState::RolledBack).map(drop)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Factory for [`MemoryUnitOfWork`] scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryUnitOfWorkFactory;

#[async_trait]
impl UnitOfWorkFactory for MemoryUnitOfWorkFactory {
    async fn begin(&self) -> Result<Arc<dyn UnitOfWork>, CoreError> {
        Ok(Arc::new(MemoryUnitOfWork::new()))
    }
}

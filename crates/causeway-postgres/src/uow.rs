//! Database-transaction unit of work.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use causeway_core::error::CoreError;
use causeway_core::uow::{UnitOfWork, UnitOfWorkFactory};

use crate::storage_err;

/// A unit of work backed by one `PostgreSQL` transaction. Stores downcast to
/// this type and run their statements on the wrapped transaction; commit and
/// rollback consume it.
pub struct PgUnitOfWork {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgUnitOfWork {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }

    /// Locks the wrapped transaction for a batch of statements. The slot is
    /// `None` once the scope was committed or rolled back.
    pub async fn transaction(&self) -> MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.tx.lock().await
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(&self) -> Result<(), CoreError> {
        let tx = self.tx.lock().await.take().ok_or_else(|| {
            CoreError::Storage("unit of work already completed".to_string())
        })?;
        tx.commit().await.map_err(storage_err)
    }

    async fn rollback(&self) -> Result<(), CoreError> {
        let tx = self.tx.lock().await.take().ok_or_else(|| {
            CoreError::Storage("unit of work already completed".to_string())
        })?;
        tx.rollback().await.map_err(storage_err)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Opens one database transaction per scope.
#[derive(Clone)]
pub struct PgUnitOfWorkFactory {
    pool: PgPool,
}

impl PgUnitOfWorkFactory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> Result<Arc<dyn UnitOfWork>, CoreError> {
        let tx = self.pool.begin().await.map_err(storage_err)?;
        Ok(Arc::new(PgUnitOfWork::new(tx)))
    }
}

/// Downcasts a caller-supplied unit of work to [`PgUnitOfWork`].
pub(crate) fn require_pg(uow: &dyn UnitOfWork) -> Result<&PgUnitOfWork, CoreError> {
    uow.as_any().downcast_ref::<PgUnitOfWork>().ok_or_else(|| {
        CoreError::Storage("postgres stores require a PgUnitOfWork".to_string())
    })
}

//! Database transaction utilities
//!
//! Wrapper for multi-statement operations that must be atomic, such as a locked
//! read followed by a state update.

use anyhow::{Context, Result};
use sqlx::{PgPool, Postgres, Transaction};
use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// A database transaction that logs how long it was held.
///
/// Dropping the guard without committing rolls the transaction back (sqlx does this
/// when the inner transaction is dropped).
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool).await?;
/// sqlx::query("UPDATE documents ...").execute(&mut **tx).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Transaction<'a, Postgres>,
    started: Instant,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool) -> Result<Self> {
        let transaction = pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;

        Ok(Self {
            transaction,
            started: Instant::now(),
        })
    }

    pub async fn commit(self) -> Result<()> {
        let held_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        self.transaction
            .commit()
            .await
            .context("Failed to commit database transaction")?;
        tracing::debug!(held_ms, "Transaction committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.transaction
            .rollback()
            .await
            .context("Failed to rollback database transaction")?;
        Ok(())
    }
}

impl<'a> Deref for TransactionGuard<'a> {
    type Target = Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<'a> DerefMut for TransactionGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

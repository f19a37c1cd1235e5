//! Scoped transaction handling.

use std::fmt;

use tracing::{error, warn};

use super::error::StoreError;
use super::store::{LargeObjectTx, TransactionSource};

/// A transaction that ends in exactly one commit or rollback.
///
/// Finish a scope with [`commit`](Self::commit) or [`abort`](Self::abort).
/// A scope dropped without either (early return, panic, cancelled future)
/// drops its transaction, which rolls it back.
///
/// # Example
///
/// ```ignore
/// let scope = TxScope::begin(&pool, "delete image").await?;
/// if let Err(err) = protocol::delete_in_tx(scope.tx(), &image).await {
///     return Err(scope.abort(err).await);
/// }
/// scope.commit().await?;
/// ```
#[derive(Debug)]
pub struct TxScope<T: LargeObjectTx> {
    tx: T,
    operation: &'static str,
}

impl<T: LargeObjectTx> TxScope<T> {
    /// Begins a transaction for `operation`, used as a log label.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started.
    pub async fn begin<S>(source: &S, operation: &'static str) -> Result<Self, StoreError>
    where
        S: TransactionSource<Tx = T> + ?Sized,
    {
        let tx = source.begin().await.inspect_err(|e| {
            error!(operation, error = %e, "Failed to begin transaction");
        })?;
        Ok(Self { tx, operation })
    }

    /// The open transaction.
    #[must_use]
    pub fn tx(&self) -> &T {
        &self.tx
    }

    /// Label given at [`begin`](Self::begin).
    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Commits the transaction.
    ///
    /// No rollback is attempted after a failed commit: the backing store
    /// discards a transaction whose commit fails.
    ///
    /// # Errors
    ///
    /// Returns the commit error.
    pub async fn commit(self) -> Result<(), StoreError> {
        let Self { tx, operation } = self;
        tx.commit().await.inspect_err(|e| {
            error!(operation, error = %e, "Failed to commit transaction");
        })
    }

    /// Rolls the transaction back because of `cause`, returning `cause`.
    ///
    /// A failing rollback is logged and the original error still returned.
    pub async fn abort<E>(self, cause: E) -> E
    where
        E: fmt::Display + Send,
    {
        let Self { tx, operation } = self;
        match tx.rollback().await {
            Ok(()) => warn!(operation, error = %cause, "Transaction rolled back"),
            Err(rollback_err) => error!(
                operation,
                error = %cause,
                rollback_error = %rollback_err,
                "Rollback failed"
            ),
        }
        cause
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::large_object::mock::MemoryStore;

    #[tokio::test]
    async fn test_abort_returns_cause_when_rollback_fails() {
        let store = MemoryStore::default();
        store.fail_rollback();

        let scope = TxScope::begin(&store, "test").await.unwrap();
        let err = scope.abort(StoreError::MissingOid).await;

        assert!(matches!(err, StoreError::MissingOid));
        assert_eq!(store.probe().rollbacks, 1);
    }

    #[tokio::test]
    async fn test_dropped_scope_never_commits() {
        let store = MemoryStore::default();
        {
            let scope = TxScope::begin(&store, "test").await.unwrap();
            assert_eq!(scope.operation(), "test");
        }
        let probe = store.probe();
        assert_eq!(probe.commits, 0);
        assert_eq!(probe.dropped, 1);
    }

    #[tokio::test]
    async fn test_begin_failure_is_returned() {
        let store = MemoryStore::default();
        store.fail_begin();

        let result = TxScope::begin(&store, "test").await;
        assert!(matches!(result, Err(StoreError::Connection(_))));
    }
}

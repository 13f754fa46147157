// Transaction Boundary - scoped ownership of one invocation's connection

use crate::domain::{NewUser, RollbackCause, TransactionState, Verdict};
use crate::error::{AppError, Result};
use crate::port::{TransactionalUserRepository, UserRepositoryTransaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

type TxSlot = Arc<Mutex<Option<Box<dyn UserRepositoryTransaction>>>>;

/// Clonable handle given to chunk jobs.
///
/// Every write goes through the slot lock, so the connection is never used
/// by two jobs at once. Once the scope is finished the slot is empty and
/// late writes fail instead of touching the connection.
#[derive(Clone)]
pub struct SharedTransaction {
    slot: TxSlot,
}

impl SharedTransaction {
    pub async fn insert_batch(&self, users: &[NewUser]) -> Result<i64> {
        let mut guard = self.slot.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::InvalidState("transaction already finalized".to_string()))?;
        tx.insert_batch(users).await
    }
}

/// Owns the transaction for exactly one save invocation.
///
/// `finish` commits or rolls back and always releases the connection. If the
/// scope is dropped without `finish` (early return, cancelled future), the
/// rollback and release are scheduled on the current runtime.
pub struct TransactionScope {
    batch_id: String,
    slot: TxSlot,
    state: TransactionState,
}

impl TransactionScope {
    /// Acquire a connection and begin the transaction
    pub async fn open(repo: &dyn TransactionalUserRepository, batch_id: &str) -> Result<Self> {
        let tx = repo.begin_transaction().await?;
        debug!(batch_id = %batch_id, "Transaction opened");
        Ok(Self {
            batch_id: batch_id.to_string(),
            slot: Arc::new(Mutex::new(Some(tx))),
            state: TransactionState::Open,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn shared(&self) -> SharedTransaction {
        SharedTransaction {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Delete existing rows inside this transaction
    pub async fn delete_all(&self) -> Result<u64> {
        let mut guard = self.slot.lock().await;
        let tx = guard
            .as_mut()
            .ok_or_else(|| AppError::InvalidState("transaction already finalized".to_string()))?;
        tx.delete_all().await
    }

    /// Apply `verdict`, then release the connection.
    ///
    /// Waits for any write in progress before taking the connection. A failed
    /// commit is followed by a rollback attempt and reported as
    /// `BatchRolledBack { cause: BoundaryFault }`. A failed rollback or release
    /// is logged; the adapter discards the connection in that case.
    pub async fn finish(mut self, verdict: &Verdict) -> Result<TransactionState> {
        let taken = self.slot.lock().await.take();
        let Some(mut tx) = taken else {
            return Err(AppError::InvalidState(
                "transaction already finalized".to_string(),
            ));
        };

        let result = match verdict {
            Verdict::Commit => match tx.commit().await {
                Ok(()) => self.state.commit().map(|_| self.state).map_err(AppError::from),
                Err(e) => {
                    error!(batch_id = %self.batch_id, error = %e, "Commit failed, rolling back");
                    if let Err(rb) = tx.rollback().await {
                        error!(batch_id = %self.batch_id, error = %rb, "Rollback after failed commit also failed");
                    }
                    let _ = self.state.roll_back();
                    Err(AppError::BatchRolledBack {
                        cause: RollbackCause::BoundaryFault,
                    })
                }
            },
            Verdict::Rollback { cause } => {
                if let Err(e) = tx.rollback().await {
                    error!(batch_id = %self.batch_id, error = %e, %cause, "Rollback failed");
                }
                self.state
                    .roll_back()
                    .map(|_| self.state)
                    .map_err(AppError::from)
            }
        };

        if let Err(e) = tx.close().await {
            warn!(batch_id = %self.batch_id, error = %e, "Failed to release connection");
        }
        debug!(batch_id = %self.batch_id, state = %self.state, "Transaction finalized");

        result
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.state.is_final() {
            return;
        }

        let slot = Arc::clone(&self.slot);
        let batch_id = std::mem::take(&mut self.batch_id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(batch_id = %batch_id, "Transaction scope dropped while open, rolling back");
                handle.spawn(async move {
                    let taken = slot.lock().await.take();
                    if let Some(mut tx) = taken {
                        if let Err(e) = tx.rollback().await {
                            error!(batch_id = %batch_id, error = %e, "Deferred rollback failed");
                        }
                        if let Err(e) = tx.close().await {
                            warn!(batch_id = %batch_id, error = %e, "Deferred release failed");
                        }
                    }
                });
            }
            Err(_) => {
                error!(batch_id = %batch_id, "Transaction scope dropped outside a runtime, connection discarded");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::transaction::mocks::MockUserStore;
    use std::time::Duration;

    fn users(n: usize) -> Vec<NewUser> {
        (0..n)
            .map(|i| NewUser::new(format!("user-{}", i), format!("user-{}@example.com", i), 20))
            .collect()
    }

    #[tokio::test]
    async fn test_commit_persists_and_releases() {
        let store = MockUserStore::new();
        let scope = TransactionScope::open(&store, "b-1").await.unwrap();
        assert_eq!(store.open_transactions(), 1);

        scope.shared().insert_batch(&users(3)).await.unwrap();
        let state = scope.finish(&Verdict::Commit).await.unwrap();

        assert_eq!(state, TransactionState::Committed);
        assert_eq!(store.committed().len(), 3);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_rollback_discards_and_releases() {
        let store = MockUserStore::new();
        let scope = TransactionScope::open(&store, "b-2").await.unwrap();
        scope.shared().insert_batch(&users(2)).await.unwrap();

        let verdict = Verdict::rollback(RollbackCause::ExecutionFault { chunk: 0 });
        let state = scope.finish(&verdict).await.unwrap();

        assert_eq!(state, TransactionState::RolledBack);
        assert!(store.committed().is_empty());
        assert_eq!(store.rollbacks(), 1);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_rolls_back_then_reports_boundary_fault() {
        let store = MockUserStore::new().failing_commit();
        let scope = TransactionScope::open(&store, "b-3").await.unwrap();
        scope.shared().insert_batch(&users(2)).await.unwrap();

        let err = scope.finish(&Verdict::Commit).await.unwrap_err();
        assert_eq!(err.rollback_cause(), Some(&RollbackCause::BoundaryFault));
        assert_eq!(store.rollbacks(), 1);
        assert!(store.committed().is_empty());
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_rollback_failure_still_releases() {
        let store = MockUserStore::new().failing_rollback();
        let scope = TransactionScope::open(&store, "b-4").await.unwrap();

        let verdict = Verdict::rollback(RollbackCause::ClearFailed);
        let state = scope.finish(&verdict).await.unwrap();
        assert_eq!(state, TransactionState::RolledBack);
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_close_failure_does_not_change_the_outcome() {
        let store = MockUserStore::new().failing_close();
        let scope = TransactionScope::open(&store, "b-7").await.unwrap();
        scope.shared().insert_batch(&users(2)).await.unwrap();
        let state = scope.finish(&Verdict::Commit).await.unwrap();
        assert_eq!(state, TransactionState::Committed);
        assert_eq!(store.committed().len(), 2);

        let store = MockUserStore::new().failing_close().failing_rollback();
        let scope = TransactionScope::open(&store, "b-8").await.unwrap();
        scope.shared().insert_batch(&users(2)).await.unwrap();
        let verdict = Verdict::rollback(RollbackCause::ExecutionFault { chunk: 1 });
        let state = scope.finish(&verdict).await.unwrap();
        assert_eq!(state, TransactionState::RolledBack);
        assert!(store.committed().is_empty());
        assert_eq!(store.open_transactions(), 0);
    }

    #[tokio::test]
    async fn test_write_after_finish_is_rejected() {
        let store = MockUserStore::new();
        let scope = TransactionScope::open(&store, "b-5").await.unwrap();
        let shared = scope.shared();
        scope.finish(&Verdict::Commit).await.unwrap();

        let err = shared.insert_batch(&users(1)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_scope_rolls_back_and_releases() {
        let store = MockUserStore::new();
        {
            let scope = TransactionScope::open(&store, "b-6").await.unwrap();
            scope.shared().insert_batch(&users(2)).await.unwrap();
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.open_transactions(), 0);
        assert_eq!(store.rollbacks(), 1);
        assert!(store.committed().is_empty());
    }
}

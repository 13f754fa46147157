// Transaction port for atomic multi-chunk inserts

use crate::domain::NewUser;
use crate::error::Result;
use async_trait::async_trait;

/// One live connection with manual commit control.
///
/// `commit` and `rollback` do not consume the handle so a failed commit can
/// still be rolled back on the same connection. `close` releases the
/// connection and must be called exactly once.
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(&mut self) -> Result<()>;

    /// Rollback the transaction (no-op if nothing is pending)
    async fn rollback(&mut self) -> Result<()>;

    /// Release the connection, discarding anything not committed
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Transactional user repository operations
#[async_trait]
pub trait TransactionalUserRepository: Send + Sync {
    /// Acquire a connection and begin a new transaction
    async fn begin_transaction(&self) -> Result<Box<dyn UserRepositoryTransaction>>;
}

/// User writes within a transaction
#[async_trait]
pub trait UserRepositoryTransaction: Transaction {
    /// Delete every existing user (within transaction)
    async fn delete_all(&mut self) -> Result<u64>;

    /// Insert a batch of users (within transaction), returns rows affected
    async fn insert_batch(&mut self, users: &[NewUser]) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::User;
    use crate::error::AppError;
    use crate::port::UserRepository;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records whose name starts with this fail their insert
    pub const FAIL_MARKER: &str = "fail";
    /// A chunk containing a record starting with this reports 0 rows
    pub const ZERO_MARKER: &str = "zero";
    /// Records whose name starts with this panic the job
    pub const PANIC_MARKER: &str = "panic";
    /// Records whose name starts with this take `SLOW_INSERT_DELAY` to insert
    pub const SLOW_MARKER: &str = "slow";
    pub const SLOW_INSERT_DELAY: Duration = Duration::from_millis(200);

    #[derive(Default)]
    struct StoreState {
        committed: Vec<User>,
        next_id: i64,
        open_transactions: usize,
        commits: usize,
        rollbacks: usize,
        insert_calls: usize,
    }

    /// In-memory user store with scripted failures
    #[derive(Clone, Default)]
    pub struct MockUserStore {
        state: Arc<Mutex<StoreState>>,
        insert_delay: Option<Duration>,
        fail_commit: bool,
        fail_rollback: bool,
        fail_close: bool,
        fail_delete: bool,
    }

    impl MockUserStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every insert (applied while the connection is held)
        pub fn with_insert_delay(mut self, delay: Duration) -> Self {
            self.insert_delay = Some(delay);
            self
        }

        pub fn failing_commit(mut self) -> Self {
            self.fail_commit = true;
            self
        }

        pub fn failing_rollback(mut self) -> Self {
            self.fail_rollback = true;
            self
        }

        /// Release still happens, but `close` reports a fault
        pub fn failing_close(mut self) -> Self {
            self.fail_close = true;
            self
        }

        pub fn failing_delete(mut self) -> Self {
            self.fail_delete = true;
            self
        }

        /// Insert already-committed rows
        pub fn seed(&self, users: &[NewUser]) {
            let mut state = self.state.lock().unwrap();
            for user in users {
                state.next_id += 1;
                let id = state.next_id;
                state.committed.push(to_user(id, user));
            }
        }

        pub fn committed(&self) -> Vec<User> {
            self.state.lock().unwrap().committed.clone()
        }

        pub fn open_transactions(&self) -> usize {
            self.state.lock().unwrap().open_transactions
        }

        pub fn commits(&self) -> usize {
            self.state.lock().unwrap().commits
        }

        pub fn rollbacks(&self) -> usize {
            self.state.lock().unwrap().rollbacks
        }

        pub fn insert_calls(&self) -> usize {
            self.state.lock().unwrap().insert_calls
        }
    }

    fn to_user(id: i64, user: &NewUser) -> User {
        User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            age: user.age,
            created_at: 0,
        }
    }

    #[async_trait]
    impl TransactionalUserRepository for MockUserStore {
        async fn begin_transaction(&self) -> Result<Box<dyn UserRepositoryTransaction>> {
            self.state.lock().unwrap().open_transactions += 1;
            Ok(Box::new(MockUserTransaction {
                store: self.clone(),
                pending: Vec::new(),
                cleared: false,
            }))
        }
    }

    #[async_trait]
    impl UserRepository for MockUserStore {
        async fn list_users(&self) -> Result<Vec<User>> {
            Ok(self.committed())
        }

        async fn count_users(&self) -> Result<i64> {
            Ok(self.state.lock().unwrap().committed.len() as i64)
        }
    }

    /// Transaction over `MockUserStore`; writes stay pending until commit
    pub struct MockUserTransaction {
        store: MockUserStore,
        pending: Vec<NewUser>,
        cleared: bool,
    }

    #[async_trait]
    impl Transaction for MockUserTransaction {
        async fn commit(&mut self) -> Result<()> {
            if self.store.fail_commit {
                return Err(AppError::Database("scripted commit failure".to_string()));
            }
            let mut state = self.store.state.lock().unwrap();
            if self.cleared {
                state.committed.clear();
            }
            for user in self.pending.drain(..) {
                state.next_id += 1;
                let id = state.next_id;
                state.committed.push(to_user(id, &user));
            }
            state.commits += 1;
            Ok(())
        }

        async fn rollback(&mut self) -> Result<()> {
            self.store.state.lock().unwrap().rollbacks += 1;
            if self.store.fail_rollback {
                return Err(AppError::Database("scripted rollback failure".to_string()));
            }
            self.pending.clear();
            self.cleared = false;
            Ok(())
        }

        async fn close(self: Box<Self>) -> Result<()> {
            self.store.state.lock().unwrap().open_transactions -= 1;
            if self.store.fail_close {
                return Err(AppError::Database("scripted close failure".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl UserRepositoryTransaction for MockUserTransaction {
        async fn delete_all(&mut self) -> Result<u64> {
            if self.store.fail_delete {
                return Err(AppError::Database("scripted delete failure".to_string()));
            }
            self.cleared = true;
            self.pending.clear();
            Ok(self.store.state.lock().unwrap().committed.len() as u64)
        }

        async fn insert_batch(&mut self, users: &[NewUser]) -> Result<i64> {
            self.store.state.lock().unwrap().insert_calls += 1;

            if let Some(delay) = self.store.insert_delay {
                tokio::time::sleep(delay).await;
            }
            if users.iter().any(|u| u.name.starts_with(SLOW_MARKER)) {
                tokio::time::sleep(SLOW_INSERT_DELAY).await;
            }
            if let Some(user) = users.iter().find(|u| u.name.starts_with(PANIC_MARKER)) {
                panic!("scripted panic for {}", user.name);
            }
            if let Some(user) = users.iter().find(|u| u.name.starts_with(FAIL_MARKER)) {
                return Err(AppError::Database(format!(
                    "scripted insert failure for {}",
                    user.name
                )));
            }
            if users.iter().any(|u| u.name.starts_with(ZERO_MARKER)) {
                return Ok(0);
            }

            self.pending.extend_from_slice(users);
            Ok(users.len() as i64)
        }
    }
}

//! Shared fixtures: throwaway SQLite files and a zero-row decorator

#![allow(dead_code)]

use async_trait::async_trait;
use batchtx_core::application::{BatchConfig, BatchSaveService, PoolConfig, WorkerPool};
use batchtx_core::domain::NewUser;
use batchtx_core::error::Result;
use batchtx_core::port::id_provider::UuidProvider;
use batchtx_core::port::time_provider::SystemTimeProvider;
use batchtx_core::port::{
    Transaction, TransactionalUserRepository, UserRepository, UserRepositoryTransaction,
};
use batchtx_infra_sqlite::{create_pool, run_migrations, SqliteUserRepository};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Names starting with this make the decorated insert report 0 rows
pub const ZERO_ROWS_MARKER: &str = "zero-rows";

/// SQLite database file removed on drop
pub struct TestDb {
    pub path: PathBuf,
    pub repo: Arc<SqliteUserRepository>,
}

impl TestDb {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("batchtx-it-{}.db", uuid::Uuid::new_v4()));
        let repo = Self::open(&path).await;
        Self { path, repo }
    }

    /// Open (or reopen) the database at `path`
    pub async fn open(path: &std::path::Path) -> Arc<SqliteUserRepository> {
        let pool = create_pool(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        Arc::new(SqliteUserRepository::new(pool, Arc::new(SystemTimeProvider)))
    }

    pub async fn count(&self) -> i64 {
        self.repo.count_users().await.unwrap()
    }

    pub async fn names(&self) -> Vec<String> {
        self.repo
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect()
    }

    pub fn service(&self, pool: PoolConfig, config: BatchConfig) -> BatchSaveService {
        service_with(self.repo.clone(), Arc::new(WorkerPool::new(pool)), config)
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
        let _ = std::fs::remove_file(self.path.with_extension("db-wal"));
        let _ = std::fs::remove_file(self.path.with_extension("db-shm"));
    }
}

pub fn service_with(
    repo: Arc<dyn TransactionalUserRepository>,
    pool: Arc<WorkerPool>,
    config: BatchConfig,
) -> BatchSaveService {
    BatchSaveService::new(repo, pool, Arc::new(UuidProvider), config)
}

pub fn config(chunk_size: usize) -> BatchConfig {
    BatchConfig {
        chunk_size,
        clear_before_insert: true,
    }
}

pub fn users(prefix: &str, n: usize) -> Vec<NewUser> {
    (0..n)
        .map(|i| {
            NewUser::new(
                format!("{}-{}", prefix, i),
                format!("{}-{}@example.com", prefix, i),
                (i % 90) as i32,
            )
        })
        .collect()
}

/// Wraps the SQLite repository; inserts containing `ZERO_ROWS_MARKER` skip
/// the write and report 0 rows affected.
pub struct ZeroRowsRepo(pub Arc<SqliteUserRepository>);

#[async_trait]
impl TransactionalUserRepository for ZeroRowsRepo {
    async fn begin_transaction(&self) -> Result<Box<dyn UserRepositoryTransaction>> {
        Ok(Box::new(ZeroRowsTx(self.0.begin_transaction().await?)))
    }
}

struct ZeroRowsTx(Box<dyn UserRepositoryTransaction>);

#[async_trait]
impl Transaction for ZeroRowsTx {
    async fn commit(&mut self) -> Result<()> {
        self.0.commit().await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.0.rollback().await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.0.close().await
    }
}

#[async_trait]
impl UserRepositoryTransaction for ZeroRowsTx {
    async fn delete_all(&mut self) -> Result<u64> {
        self.0.delete_all().await
    }

    async fn insert_batch(&mut self, users: &[NewUser]) -> Result<i64> {
        if users.iter().any(|u| u.name.starts_with(ZERO_ROWS_MARKER)) {
            return Ok(0);
        }
        self.0.insert_batch(users).await
    }
}

// SQLite UserRepository Implementation

use crate::error::map_sqlx_error;
use crate::SqliteUserTransaction;
use async_trait::async_trait;
use batchtx_core::domain::User;
use batchtx_core::error::Result;
use batchtx_core::port::{
    TimeProvider, TransactionalUserRepository, UserRepository, UserRepositoryTransaction,
};
use sqlx::SqlitePool;
use std::sync::Arc;

pub struct SqliteUserRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            "SELECT id, name, email, age, created_at FROM users ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl TransactionalUserRepository for SqliteUserRepository {
    async fn begin_transaction(&self) -> Result<Box<dyn UserRepositoryTransaction>> {
        let tx = SqliteUserTransaction::begin(&self.pool, Arc::clone(&self.time_provider)).await?;
        Ok(Box::new(tx))
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    age: i32,
    created_at: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            age: row.age,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use batchtx_core::domain::NewUser;
    use batchtx_core::error::AppError;
    use batchtx_core::port::time_provider::FixedTimeProvider;
    use batchtx_core::port::Transaction;

    const NOW: i64 = 1_700_000_000_000;

    async fn setup() -> (SqliteUserRepository, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("batchtx-repo-{}.db", uuid::Uuid::new_v4()));
        let pool = create_pool(&format!("sqlite://{}", path.display()))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        (
            SqliteUserRepository::new(pool, Arc::new(FixedTimeProvider(NOW))),
            path,
        )
    }

    fn users(prefix: &str, n: usize) -> Vec<NewUser> {
        (0..n)
            .map(|i| NewUser::new(format!("{}-{}", prefix, i), format!("{}-{}@example.com", prefix, i), 25))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_commit_and_list() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        assert_eq!(tx.insert_batch(&users("a", 3)).await.unwrap(), 3);
        assert_eq!(tx.insert_batch(&users("b", 2)).await.unwrap(), 2);
        tx.commit().await.unwrap();
        tx.close().await.unwrap();

        let listed = repo.list_users().await.unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0].name, "a-0");
        assert_eq!(listed[4].email, "b-1@example.com");
        assert!(listed.iter().all(|u| u.created_at == NOW));
        assert_eq!(repo.count_users().await.unwrap(), 5);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_rollback_discards_inserts_and_delete() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert_batch(&users("seed", 2)).await.unwrap();
        tx.commit().await.unwrap();
        tx.close().await.unwrap();

        let mut tx = repo.begin_transaction().await.unwrap();
        assert_eq!(tx.delete_all().await.unwrap(), 2);
        tx.insert_batch(&users("new", 4)).await.unwrap();
        tx.rollback().await.unwrap();
        tx.close().await.unwrap();

        let listed = repo.list_users().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|u| u.name.starts_with("seed")));

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_constraint_violation_keeps_transaction_usable_for_rollback() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert_batch(&users("dup", 1)).await.unwrap();
        let err = tx.insert_batch(&users("dup", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Database(ref msg) if msg.contains("Unique constraint")));

        tx.rollback().await.unwrap();
        tx.close().await.unwrap();
        assert_eq!(repo.count_users().await.unwrap(), 0);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_close_without_decision_rolls_back() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert_batch(&users("open", 3)).await.unwrap();
        tx.close().await.unwrap();

        assert_eq!(repo.count_users().await.unwrap(), 0);

        // The connection is usable again for the next transaction
        let mut tx = repo.begin_transaction().await.unwrap();
        tx.insert_batch(&users("next", 1)).await.unwrap();
        tx.commit().await.unwrap();
        tx.close().await.unwrap();
        assert_eq!(repo.count_users().await.unwrap(), 1);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_write_after_commit_is_rejected() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        tx.commit().await.unwrap();
        let err = tx.insert_batch(&users("late", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
        // Rollback after commit is a no-op
        tx.rollback().await.unwrap();
        tx.close().await.unwrap();

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_large_batch_is_split_across_statements() {
        let (repo, path) = setup().await;

        let mut tx = repo.begin_transaction().await.unwrap();
        let rows = tx.insert_batch(&users("bulk", 9000)).await.unwrap();
        tx.commit().await.unwrap();
        tx.close().await.unwrap();

        assert_eq!(rows, 9000);
        assert_eq!(repo.count_users().await.unwrap(), 9000);

        let _ = std::fs::remove_file(path);
    }
}

// SQLite Transaction Implementation
//
// Holds one pooled connection with a manually issued BEGIN so that a failed
// COMMIT can still be followed by a ROLLBACK on the same connection.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use batchtx_core::domain::NewUser;
use batchtx_core::error::{AppError, Result};
use batchtx_core::port::{TimeProvider, Transaction, UserRepositoryTransaction};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, warn};

/// SQLite caps bound parameters per statement at 32766
const MAX_BIND_PARAMS: usize = 32766;
const INSERT_COLUMNS: usize = 4;
const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMS / INSERT_COLUMNS;

pub struct SqliteUserTransaction {
    conn: Option<PoolConnection<Sqlite>>,
    /// BEGIN issued and neither COMMIT nor ROLLBACK succeeded yet
    active: bool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteUserTransaction {
    /// Acquire a connection from `pool` and begin a write transaction.
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent saves
    /// queue on the busy timeout instead of failing on lock upgrade.
    pub async fn begin(pool: &SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Result<Self> {
        let mut conn = pool.acquire().await.map_err(map_sqlx_error)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self {
            conn: Some(conn),
            active: true,
            time_provider,
        })
    }

    fn conn(&mut self) -> Result<&mut SqliteConnection> {
        match self.conn.as_mut() {
            Some(conn) if self.active => Ok(&mut **conn),
            _ => Err(AppError::InvalidState(
                "transaction is not active".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Transaction for SqliteUserTransaction {
    async fn commit(&mut self) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query("COMMIT")
            .execute(conn)
            .await
            .map_err(map_sqlx_error)?;
        self.active = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let conn = self.conn()?;
        sqlx::query("ROLLBACK")
            .execute(conn)
            .await
            .map_err(map_sqlx_error)?;
        self.active = false;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        if self.active {
            if let Err(e) = self.rollback().await {
                warn!(error = %e, "Rollback on close failed, discarding connection");
            }
        }

        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        if self.active {
            // Never hand a connection with an open transaction back to the pool
            conn.detach().close().await.map_err(map_sqlx_error)?;
        } else {
            drop(conn);
            debug!("Connection returned to pool");
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepositoryTransaction for SqliteUserTransaction {
    async fn delete_all(&mut self) -> Result<u64> {
        let conn = self.conn()?;
        let result = sqlx::query("DELETE FROM users")
            .execute(conn)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn insert_batch(&mut self, users: &[NewUser]) -> Result<i64> {
        let now = self.time_provider.now_millis();
        let conn = self.conn()?;

        let mut rows = 0u64;
        for slice in users.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO users (name, email, age, created_at) ");
            builder.push_values(slice, |mut row, user| {
                row.push_bind(user.name.as_str())
                    .push_bind(user.email.as_str())
                    .push_bind(user.age)
                    .push_bind(now);
            });

            let result = builder
                .build()
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
            rows += result.rows_affected();
        }

        Ok(rows as i64)
    }
}

impl Drop for SqliteUserTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if self.active {
                warn!("Transaction dropped while active, discarding connection");
                drop(conn.detach());
            }
        }
    }
}

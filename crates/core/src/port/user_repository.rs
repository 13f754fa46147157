// User Repository Port (read side)

use crate::domain::User;
use crate::error::Result;
use async_trait::async_trait;

/// Read access to committed users (outside any batch transaction)
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// List all users ordered by ID
    async fn list_users(&self) -> Result<Vec<User>>;

    /// Count committed users
    async fn count_users(&self) -> Result<i64>;
}

// Batchtx Infrastructure - SQLite Adapter
// Implements: UserRepository, TransactionalUserRepository

mod connection;
mod error;
mod migration;
mod transaction;
mod user_repository;

pub use connection::{create_pool, create_pool_with_max_connections};
pub use migration::run_migrations;
pub use transaction::SqliteUserTransaction;
pub use user_repository::SqliteUserRepository;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)

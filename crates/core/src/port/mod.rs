// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod time_provider;
pub mod transaction;
pub mod user_repository;

// Re-exports
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
pub use transaction::{Transaction, TransactionalUserRepository, UserRepositoryTransaction};
pub use user_repository::UserRepository;

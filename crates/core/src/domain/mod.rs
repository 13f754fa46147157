// Domain Layer - Pure business logic and entities

pub mod chunk;
pub mod error;
pub mod transaction;
pub mod user;
pub mod verdict;

// Re-exports
pub use chunk::{partition, Chunk, ChunkPreset};
pub use error::DomainError;
pub use transaction::TransactionState;
pub use user::{NewUser, User, UserId};
pub use verdict::{ChunkOutcome, JobOutcome, RollbackCause, Verdict};

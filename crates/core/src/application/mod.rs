// Application Layer - Use Cases and Business Logic

pub mod batch_save;
pub mod pool;

// Re-exports
pub use batch_save::{BatchConfig, BatchSaveService, SaveReport, Strategy};
pub use pool::{PoolConfig, PoolError, PoolStats, WorkerPool};

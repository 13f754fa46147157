// Batch Save Service - transactional fan-out insert of a user set

pub mod aggregator;
pub mod scope;
pub mod strategy;


pub use aggregator::{aggregate, AggregationPolicy, Aggregator};
pub use scope::{SharedTransaction, TransactionScope};
pub use strategy::Strategy;

use crate::application::pool::WorkerPool;
use crate::domain::chunk::DEFAULT_CHUNK_SIZE;
use crate::domain::{
    partition, ChunkOutcome, ChunkPreset, NewUser, RollbackCause, TransactionState, Verdict,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TransactionalUserRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};

/// Per-invocation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records per chunk (>= 1)
    pub chunk_size: usize,
    /// Delete existing users inside the same transaction before inserting
    pub clear_before_insert: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            clear_before_insert: true,
        }
    }
}

impl BatchConfig {
    pub fn from_preset(preset: ChunkPreset) -> Self {
        Self {
            chunk_size: preset.size(),
            ..Self::default()
        }
    }
}

/// Result of a committed save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReport {
    pub batch_id: String,
    pub strategy: Strategy,
    pub chunks: usize,
    pub rows_inserted: i64,
    pub rows_cleared: u64,
    pub state: TransactionState,
    pub outcomes: Vec<ChunkOutcome>,
}

/// Batch Save Service
///
/// Partitions the input, opens one transaction, fans chunk jobs out to the
/// shared worker pool with the chosen strategy, and commits only if every
/// chunk inserted at least one row.
pub struct BatchSaveService {
    repo: Arc<dyn TransactionalUserRepository>,
    pool: Arc<WorkerPool>,
    id_provider: Arc<dyn IdProvider>,
    config: BatchConfig,
}

impl BatchSaveService {
    pub fn new(
        repo: Arc<dyn TransactionalUserRepository>,
        pool: Arc<WorkerPool>,
        id_provider: Arc<dyn IdProvider>,
        config: BatchConfig,
    ) -> Self {
        Self {
            repo,
            pool,
            id_provider,
            config,
        }
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Wait-all-then-decide
    pub async fn save_wait_all(&self, users: Vec<NewUser>) -> Result<SaveReport> {
        self.save(Strategy::WaitAll, users).await
    }

    /// Submit-then-collect
    pub async fn save_submit_collect(&self, users: Vec<NewUser>) -> Result<SaveReport> {
        self.save(Strategy::SubmitCollect, users).await
    }

    /// Sequential-async-chain
    pub async fn save_sequential_chain(&self, users: Vec<NewUser>) -> Result<SaveReport> {
        self.save(Strategy::SequentialChain, users).await
    }

    /// Save `users` in one transaction using `strategy`.
    ///
    /// # Errors
    /// - `AppError::Validation` for an empty record set
    /// - `AppError::Domain` for an invalid chunk size
    /// - `AppError::Database` if no transaction could be opened
    /// - `AppError::BatchRolledBack` for every failure after the transaction opened
    pub async fn save(&self, strategy: Strategy, users: Vec<NewUser>) -> Result<SaveReport> {
        let batch_id = self.id_provider.generate_id();
        let span = info_span!("save_batch", batch_id = %batch_id, strategy = %strategy);
        self.execute(batch_id, strategy, users).instrument(span).await
    }

    async fn execute(
        &self,
        batch_id: String,
        strategy: Strategy,
        users: Vec<NewUser>,
    ) -> Result<SaveReport> {
        if users.is_empty() {
            return Err(AppError::Validation(
                "record set cannot be empty".to_string(),
            ));
        }

        let records = users.len();
        let chunks = partition(users, self.config.chunk_size)?;
        let chunk_count = chunks.len();
        info!(records, chunks = chunk_count, chunk_size = self.config.chunk_size, "Starting batch save");

        let scope = TransactionScope::open(self.repo.as_ref(), &batch_id).await?;
        let mut aggregator = Aggregator::new(strategy.aggregation_policy());

        let mut rows_cleared = 0;
        if self.config.clear_before_insert {
            match scope.delete_all().await {
                Ok(n) => rows_cleared = n,
                Err(e) => {
                    error!(error = %e, "Failed to clear existing users");
                    aggregator.record_fault(RollbackCause::ClearFailed);
                }
            }
        }

        if !aggregator.has_failed() {
            let tx = scope.shared();
            strategy::dispatch(strategy, &self.pool, &tx, chunks, &mut aggregator).await;
        }

        let verdict = aggregator.verdict();
        let state = scope.finish(&verdict).await?;

        match verdict {
            Verdict::Commit => {
                let rows_inserted = aggregator.rows_affected();
                info!(rows_inserted, rows_cleared, "Batch committed");
                Ok(SaveReport {
                    batch_id,
                    strategy,
                    chunks: chunk_count,
                    rows_inserted,
                    rows_cleared,
                    state,
                    outcomes: aggregator.into_outcomes(),
                })
            }
            Verdict::Rollback { cause } => {
                error!(%cause, outcomes = aggregator.outcomes().len(), "Batch rolled back");
                Err(AppError::BatchRolledBack { cause })
            }
        }
    }
}

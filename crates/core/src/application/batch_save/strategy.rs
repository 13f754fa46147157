// Coordination Strategies - three ways to fan chunk jobs out to the pool
//
// Every strategy runs Dispatching -> Awaiting and leaves the verdict in the
// aggregator; Deciding and Finalized happen in the service.

use super::aggregator::{AggregationPolicy, Aggregator};
use super::scope::SharedTransaction;
use crate::application::pool::{JobError, PoolError, WorkerPool};
use crate::domain::{Chunk, ChunkOutcome, NewUser, RollbackCause};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// Which coordination algorithm a save uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Submit the whole batch, wait for all of it, then decide
    WaitAll,
    /// Submit everything without waiting, then collect results in order
    SubmitCollect,
    /// Submit one job, await it, then submit the next
    SequentialChain,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [
        Strategy::WaitAll,
        Strategy::SubmitCollect,
        Strategy::SequentialChain,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::WaitAll => "wait_all",
            Strategy::SubmitCollect => "submit_collect",
            Strategy::SequentialChain => "sequential_chain",
        }
    }

    /// Wait-all drains every result; the other two stop at the first failure
    pub fn aggregation_policy(self) -> AggregationPolicy {
        match self {
            Strategy::WaitAll => AggregationPolicy::CollectAll,
            Strategy::SubmitCollect | Strategy::SequentialChain => AggregationPolicy::FailFast,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "wait_all" | "invoke_all" => Ok(Strategy::WaitAll),
            "submit_collect" | "submit" => Ok(Strategy::SubmitCollect),
            "sequential_chain" | "chain" | "sequential" => Ok(Strategy::SequentialChain),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

fn pool_cause(err: PoolError) -> RollbackCause {
    match err {
        PoolError::CapacityExceeded { capacity } => RollbackCause::CapacityExceeded { capacity },
        PoolError::Shutdown => RollbackCause::PoolUnavailable,
    }
}

fn joined(chunk: usize, result: Result<ChunkOutcome, JobError>) -> ChunkOutcome {
    result.unwrap_or_else(|e| ChunkOutcome::fault(chunk, e.to_string()))
}

/// The job for one chunk: validate (concurrently), then write (serialized)
fn chunk_job(
    tx: SharedTransaction,
    chunk: Chunk<NewUser>,
) -> impl Future<Output = ChunkOutcome> + Send + 'static {
    async move {
        let index = chunk.index;
        if let Err(e) = chunk.records.iter().try_for_each(NewUser::validate) {
            return ChunkOutcome::fault(index, e.to_string());
        }
        match tx.insert_batch(&chunk.records).await {
            Ok(rows) => ChunkOutcome::rows(index, rows),
            Err(e) => ChunkOutcome::fault(index, e.to_string()),
        }
    }
}

pub(crate) async fn dispatch(
    strategy: Strategy,
    pool: &WorkerPool,
    tx: &SharedTransaction,
    chunks: Vec<Chunk<NewUser>>,
    aggregator: &mut Aggregator,
) {
    match strategy {
        Strategy::WaitAll => wait_all(pool, tx, chunks, aggregator).await,
        Strategy::SubmitCollect => submit_then_collect(pool, tx, chunks, aggregator).await,
        Strategy::SequentialChain => sequential_chain(pool, tx, chunks, aggregator).await,
    }
}

/// Wait-all-then-decide.
///
/// A batch larger than the pool capacity is refused up front with
/// `CapacityExceeded`: a wait-for-whole-batch primitive that needs every job
/// admitted before any completes would never finish. Admission itself waits
/// for free slots (it never rejects), and every outcome is collected before
/// the decision.
pub(crate) async fn wait_all(
    pool: &WorkerPool,
    tx: &SharedTransaction,
    chunks: Vec<Chunk<NewUser>>,
    aggregator: &mut Aggregator,
) {
    let capacity = pool.capacity();
    if chunks.len() > capacity {
        warn!(
            chunks = chunks.len(),
            capacity, "Batch larger than pool capacity, refusing wait-all dispatch"
        );
        aggregator.record_fault(RollbackCause::CapacityExceeded { capacity });
        return;
    }

    let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
    let jobs: Vec<_> = chunks
        .into_iter()
        .map(|chunk| chunk_job(tx.clone(), chunk))
        .collect();

    debug!(jobs = jobs.len(), "Dispatching batch");
    match pool.invoke_all(jobs).await {
        Ok(results) => {
            for (index, result) in indices.into_iter().zip(results) {
                // Collect-all: every outcome is recorded
                let _ = aggregator.record(joined(index, result));
            }
        }
        Err(e) => aggregator.record_fault(pool_cause(e)),
    }
}

/// Submit-then-collect.
///
/// Submission never waits: a saturated pool rejects with `CapacityExceeded`,
/// which is recorded and ends dispatch. Results are awaited in submission
/// order and the first failure abandons the rest; abandoned jobs either wrote
/// before the rollback or find the transaction finalized.
pub(crate) async fn submit_then_collect(
    pool: &WorkerPool,
    tx: &SharedTransaction,
    chunks: Vec<Chunk<NewUser>>,
    aggregator: &mut Aggregator,
) {
    let mut handles = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        let index = chunk.index;
        match pool.submit(chunk_job(tx.clone(), chunk)) {
            Ok(handle) => handles.push((index, handle)),
            Err(e) => {
                warn!(chunk = index, submitted = handles.len(), error = %e, "Submission rejected");
                aggregator.record_fault(pool_cause(e));
                return;
            }
        }
    }

    debug!(jobs = handles.len(), "All jobs submitted, collecting");
    for (index, handle) in handles {
        if aggregator.record(joined(index, handle.join().await)).is_break() {
            debug!(chunk = index, "Abandoning remaining results");
            return;
        }
    }
}

/// Sequential-async-chain.
///
/// At most one job in flight: each job is admitted (waiting for a slot if
/// other callers saturate the pool) and awaited before the next is
/// submitted. A failure stops the chain; later chunks are never dispatched.
pub(crate) async fn sequential_chain(
    pool: &WorkerPool,
    tx: &SharedTransaction,
    chunks: Vec<Chunk<NewUser>>,
    aggregator: &mut Aggregator,
) {
    for chunk in chunks {
        let index = chunk.index;
        let handle = match pool.submit_blocking(chunk_job(tx.clone(), chunk)).await {
            Ok(handle) => handle,
            Err(e) => {
                aggregator.record_fault(pool_cause(e));
                return;
            }
        };
        if aggregator.record(joined(index, handle.join().await)).is_break() {
            debug!(chunk = index, "Chain stopped");
            return;
        }
    }
}

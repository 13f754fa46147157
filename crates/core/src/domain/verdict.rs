// Verdict Domain Model - per-chunk outcomes and the commit decision

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a chunk job reported back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    /// Job ran; value is rows affected (<= 0 counts as failure)
    Rows(i64),
    /// Job ran and raised an error (insert failure, validation, panic)
    Fault(String),
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Rows(n) if *n > 0)
    }
}

/// Outcome tagged with the chunk it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub chunk: usize,
    pub outcome: JobOutcome,
}

impl ChunkOutcome {
    pub fn rows(chunk: usize, rows: i64) -> Self {
        Self {
            chunk,
            outcome: JobOutcome::Rows(rows),
        }
    }

    pub fn fault(chunk: usize, reason: impl Into<String>) -> Self {
        Self {
            chunk,
            outcome: JobOutcome::Fault(reason.into()),
        }
    }

    /// Rollback cause this outcome forces, if any
    pub fn failure_cause(&self) -> Option<RollbackCause> {
        match &self.outcome {
            JobOutcome::Rows(rows) if *rows > 0 => None,
            JobOutcome::Rows(rows) => Some(RollbackCause::NonPositiveOutcome {
                chunk: self.chunk,
                rows: *rows,
            }),
            JobOutcome::Fault(_) => Some(RollbackCause::ExecutionFault { chunk: self.chunk }),
        }
    }
}

/// Why an invocation was rolled back
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RollbackCause {
    /// Pool and backlog were saturated; the job never ran
    #[error("worker pool capacity exceeded (capacity {capacity})")]
    CapacityExceeded { capacity: usize },

    /// Pool no longer accepts work
    #[error("worker pool is shut down")]
    PoolUnavailable,

    #[error("chunk {chunk} failed during insert")]
    ExecutionFault { chunk: usize },

    #[error("chunk {chunk} affected {rows} rows")]
    NonPositiveOutcome { chunk: usize, rows: i64 },

    /// Clearing existing rows before the insert failed
    #[error("clearing existing rows failed")]
    ClearFailed,

    /// Commit itself failed
    #[error("commit failed")]
    BoundaryFault,
}

/// Commit decision for one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Verdict {
    Commit,
    Rollback { cause: RollbackCause },
}

impl Verdict {
    pub fn rollback(cause: RollbackCause) -> Self {
        Verdict::Rollback { cause }
    }
}

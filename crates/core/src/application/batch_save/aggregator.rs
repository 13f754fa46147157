// Result Aggregator - folds chunk outcomes into a verdict

use crate::domain::{ChunkOutcome, JobOutcome, RollbackCause, Verdict};
use std::ops::ControlFlow;
use tracing::{info, warn};

/// When to stop looking at outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Stop at the first failed chunk; remaining outcomes are abandoned
    FailFast,
    /// Record every outcome, then decide
    CollectAll,
}

/// Verdict for a complete set of outcomes and dispatch faults.
///
/// Any fault, or any outcome that is a fault or has rows <= 0, forces
/// rollback. The first failure (faults before outcomes) becomes the cause.
pub fn aggregate(outcomes: &[ChunkOutcome], faults: &[RollbackCause]) -> Verdict {
    if let Some(cause) = faults.first() {
        return Verdict::rollback(cause.clone());
    }
    outcomes
        .iter()
        .find_map(ChunkOutcome::failure_cause)
        .map(Verdict::rollback)
        .unwrap_or(Verdict::Commit)
}

/// Incremental aggregator used by the coordination strategies
#[derive(Debug)]
pub struct Aggregator {
    policy: AggregationPolicy,
    outcomes: Vec<ChunkOutcome>,
    faults: Vec<RollbackCause>,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self {
            policy,
            outcomes: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Record one job outcome.
    ///
    /// Returns `Break` when the caller should stop awaiting further results
    /// (fail-fast policy after a failure). Collect-all never breaks.
    pub fn record(&mut self, outcome: ChunkOutcome) -> ControlFlow<()> {
        let failure = outcome.failure_cause();
        match &failure {
            None => info!(chunk = outcome.chunk, outcome = ?outcome.outcome, "Chunk processed"),
            Some(cause) => warn!(chunk = outcome.chunk, outcome = ?outcome.outcome, %cause, "Chunk failed"),
        }
        self.outcomes.push(outcome);

        if failure.is_some() && self.policy == AggregationPolicy::FailFast {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    /// Record a fault raised while dispatching (rejection, clear failure)
    pub fn record_fault(&mut self, cause: RollbackCause) {
        warn!(%cause, "Dispatch fault");
        self.faults.push(cause);
    }

    pub fn has_failed(&self) -> bool {
        !self.faults.is_empty() || self.outcomes.iter().any(|o| !o.outcome.is_success())
    }

    pub fn outcomes(&self) -> &[ChunkOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<ChunkOutcome> {
        self.outcomes
    }

    /// Sum of positive row counts recorded so far
    pub fn rows_affected(&self) -> i64 {
        self.outcomes
            .iter()
            .filter_map(|o| match o.outcome {
                JobOutcome::Rows(n) if n > 0 => Some(n),
                _ => None,
            })
            .sum()
    }

    pub fn verdict(&self) -> Verdict {
        aggregate(&self.outcomes, &self.faults)
    }
}

// Transaction Context lifecycle

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// State of one invocation's transaction context.
///
/// `Open` moves exactly once to either `Committed` or `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Open => write!(f, "OPEN"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::RolledBack => write!(f, "ROLLED_BACK"),
        }
    }
}

impl TransactionState {
    pub fn is_final(self) -> bool {
        !matches!(self, TransactionState::Open)
    }

    /// Open -> Committed
    pub fn commit(&mut self) -> Result<()> {
        self.transition(TransactionState::Committed)
    }

    /// Open -> RolledBack
    pub fn roll_back(&mut self) -> Result<()> {
        self.transition(TransactionState::RolledBack)
    }

    fn transition(&mut self, to: TransactionState) -> Result<()> {
        if *self != TransactionState::Open {
            return Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        *self = to;
        Ok(())
    }
}

// Central Error Type for the Application

use crate::domain::RollbackCause;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Coarse invocation-level failure: the transaction was rolled back
    #[error("Batch rolled back: {cause}")]
    BatchRolledBack { cause: RollbackCause },
}

impl AppError {
    /// Rollback cause carried by this error, if it is an invocation failure
    pub fn rollback_cause(&self) -> Option<&RollbackCause> {
        match self {
            AppError::BatchRolledBack { cause } => Some(cause),
            _ => None,
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)

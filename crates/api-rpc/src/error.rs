//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use batchtx_core::domain::RollbackCause;
use batchtx_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const CONFLICT: i32 = 4002;
    pub const CAPACITY_EXCEEDED: i32 = 4003;
    pub const BATCH_ROLLED_BACK: i32 = 4009;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
///
/// A rolled-back batch carries its cause category as error data; chunk
/// details stay in the daemon log.
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    match err {
        AppError::BatchRolledBack { cause } => {
            let code = match cause {
                RollbackCause::CapacityExceeded { .. } => code::CAPACITY_EXCEEDED,
                _ => code::BATCH_ROLLED_BACK,
            };
            let message = format!("Batch rolled back: {}", cause);
            ErrorObjectOwned::owned(code, message, Some(cause))
        }
        AppError::Validation(msg) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, msg, None::<()>)
        }
        AppError::Domain(e) => {
            ErrorObjectOwned::owned(code::VALIDATION_ERROR, e.to_string(), None::<()>)
        }
        AppError::Database(msg) => ErrorObjectOwned::owned(code::DB_ERROR, msg, None::<()>),
        AppError::InvalidState(msg) => ErrorObjectOwned::owned(code::CONFLICT, msg, None::<()>),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rollback_has_its_own_code() {
        let err = to_rpc_error(AppError::BatchRolledBack {
            cause: RollbackCause::CapacityExceeded { capacity: 5 },
        });
        assert_eq!(err.code(), code::CAPACITY_EXCEEDED);
        let data: serde_json::Value = serde_json::from_str(err.data().unwrap().get()).unwrap();
        assert_eq!(data["kind"], "capacity_exceeded");
        assert_eq!(data["capacity"], 5);
    }

    #[test]
    fn test_other_rollbacks_share_a_code() {
        for cause in [
            RollbackCause::ExecutionFault { chunk: 2 },
            RollbackCause::NonPositiveOutcome { chunk: 0, rows: 0 },
            RollbackCause::BoundaryFault,
        ] {
            let err = to_rpc_error(AppError::BatchRolledBack { cause });
            assert_eq!(err.code(), code::BATCH_ROLLED_BACK);
            assert!(err.message().starts_with("Batch rolled back"));
        }
    }

    #[test]
    fn test_validation_maps_to_4000() {
        let err = to_rpc_error(AppError::Validation("record set cannot be empty".into()));
        assert_eq!(err.code(), code::VALIDATION_ERROR);
    }
}

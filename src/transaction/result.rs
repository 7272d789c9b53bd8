// ============================================================================
// Result Aggregation
// ============================================================================

use crate::core::{CoordError, ErrorCode, Stat};
use serde::{Deserialize, Serialize};

/// Outcome of one operation, position-matched to the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    /// Created node's actual path (differs from the request for sequential nodes)
    Create { path: String, stat: Stat },
    Delete,
    SetData { stat: Stat },
    Check,
    Error { code: ErrorCode },
}

impl OpResult {
    pub fn is_error(&self) -> bool {
        matches!(self, OpResult::Error { .. })
    }

    /// Code of an error result
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            OpResult::Error { code } => Some(*code),
            _ => None,
        }
    }
}

/// First failing operation of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub index: usize,
    pub path: String,
    pub code: ErrorCode,
}

/// Result list of a failed batch: the real error at the failing index and
/// `TransactionAborted` everywhere else, before and after it alike.
pub fn aborted_results(batch_len: usize, failure: &ValidationFailure) -> Vec<OpResult> {
    (0..batch_len)
        .map(|index| {
            let code = if index == failure.index {
                failure.code
            } else {
                ErrorCode::TransactionAborted
            };
            OpResult::Error { code }
        })
        .collect()
}

/// Batch-level error carrying the full ordered result list.
pub fn batch_error(batch_len: usize, failure: ValidationFailure) -> CoordError {
    let results = aborted_results(batch_len, &failure);
    CoordError::TransactionFailed {
        index: failure.index,
        path: failure.path,
        code: failure.code,
        results,
    }
}

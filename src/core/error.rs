use crate::transaction::OpResult;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Per-operation failure codes carried in a multi-op result list.
///
/// The numeric values match the codes coordination clients already know
/// from the wire protocol, so they can be surfaced unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// The target node (or the parent of a node being created) does not exist
    NoNode,
    /// A node already exists at the path being created
    NodeExists,
    /// The expected version does not match the node's data version
    BadVersion,
    /// The node being deleted still has children
    NotEmpty,
    /// Malformed path, or an operation the tree can never accept
    BadArguments,
    /// This operation was fine (or never evaluated) but a sibling failed
    TransactionAborted,
}

impl ErrorCode {
    /// Numeric wire value of the code
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::NoNode => -101,
            ErrorCode::NodeExists => -110,
            ErrorCode::BadVersion => -103,
            ErrorCode::NotEmpty => -111,
            ErrorCode::BadArguments => -8,
            ErrorCode::TransactionAborted => -2,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::NoNode => "NoNode",
            ErrorCode::NodeExists => "NodeExists",
            ErrorCode::BadVersion => "BadVersion",
            ErrorCode::NotEmpty => "NotEmpty",
            ErrorCode::BadArguments => "BadArguments",
            ErrorCode::TransactionAborted => "TransactionAborted",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum CoordError {
    #[error("Transaction failed at op {index} ({path}): {code}")]
    TransactionFailed {
        index: usize,
        path: String,
        code: ErrorCode,
        results: Vec<OpResult>,
    },

    #[error("{code} for path '{path}'")]
    Operation { path: String, code: ErrorCode },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Writer halted: {0}")]
    WriterHalted(String),

    #[error("Session {0} is closed")]
    SessionClosed(u64),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Journal error: {0}")]
    Journal(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl CoordError {
    /// The per-operation code behind this error, if it came from the tree.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            CoordError::TransactionFailed { code, .. } | CoordError::Operation { code, .. } => {
                Some(*code)
            }
            _ => None,
        }
    }

    /// Ordered per-operation results of a failed batch.
    pub fn results(&self) -> Option<&[OpResult]> {
        match self {
            CoordError::TransactionFailed { results, .. } => Some(results),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoordError>;

impl<T> From<std::sync::PoisonError<T>> for CoordError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for CoordError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::NoNode.code(), -101);
        assert_eq!(ErrorCode::NodeExists.code(), -110);
        assert_eq!(ErrorCode::TransactionAborted.to_string(), "TransactionAborted");
    }

    #[test]
    fn test_transaction_failed_exposes_results() {
        let err = CoordError::TransactionFailed {
            index: 1,
            path: "/x".to_string(),
            code: ErrorCode::BadVersion,
            results: vec![
                OpResult::Error { code: ErrorCode::TransactionAborted },
                OpResult::Error { code: ErrorCode::BadVersion },
            ],
        };
        assert_eq!(err.code(), Some(ErrorCode::BadVersion));
        assert_eq!(err.results().map(|r| r.len()), Some(2));
        assert!(err.to_string().contains("BadVersion"));
    }
}

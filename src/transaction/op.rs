use crate::core::{ANY_VERSION, CreateMode};
use serde::{Deserialize, Serialize};

/// A single operation of a multi-op batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Create {
        path: String,
        data: Vec<u8>,
        mode: CreateMode,
    },
    Delete {
        path: String,
        version: i32,
    },
    SetData {
        path: String,
        data: Vec<u8>,
        version: i32,
    },
    /// Pure precondition: the node exists with the expected version
    Check {
        path: String,
        version: i32,
    },
}

impl Op {
    /// Persistent create
    pub fn create(path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Op::create_with_mode(path, data, CreateMode::Persistent)
    }

    /// Create with an explicit mode
    pub fn create_with_mode(path: impl Into<String>, data: impl Into<Vec<u8>>, mode: CreateMode) -> Self {
        Op::Create {
            path: path.into(),
            data: data.into(),
            mode,
        }
    }

    /// Delete guarded by `version` (-1 matches any)
    pub fn delete(path: impl Into<String>, version: i32) -> Self {
        Op::Delete {
            path: path.into(),
            version,
        }
    }

    /// Data update guarded by `version`
    pub fn set_data(path: impl Into<String>, data: impl Into<Vec<u8>>, version: i32) -> Self {
        Op::SetData {
            path: path.into(),
            data: data.into(),
            version,
        }
    }

    /// Version check that mutates nothing
    pub fn check(path: impl Into<String>, version: i32) -> Self {
        Op::Check {
            path: path.into(),
            version,
        }
    }

    /// Check that only asserts existence.
    pub fn check_exists(path: impl Into<String>) -> Self {
        Op::check(path, ANY_VERSION)
    }

    /// Get the target path
    pub fn path(&self) -> &str {
        match self {
            Op::Create { path, .. }
            | Op::Delete { path, .. }
            | Op::SetData { path, .. }
            | Op::Check { path, .. } => path,
        }
    }

    /// Operation name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            Op::Create { .. } => "create",
            Op::Delete { .. } => "delete",
            Op::SetData { .. } => "setData",
            Op::Check { .. } => "check",
        }
    }

    /// Bytes carried by the operation.
    pub fn payload_len(&self) -> usize {
        match self {
            Op::Create { data, .. } | Op::SetData { data, .. } => data.len(),
            _ => 0,
        }
    }

    /// Check if the operation changes the tree
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Op::Check { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_accessors() {
        let op = Op::set_data("/a", b"xyz".to_vec(), 3);
        assert_eq!(op.path(), "/a");
        assert_eq!(op.name(), "setData");
        assert_eq!(op.payload_len(), 3);
        assert!(op.is_mutating());

        let check = Op::check_exists("/a");
        assert_eq!(check, Op::Check { path: "/a".into(), version: -1 });
        assert!(!check.is_mutating());
    }

    #[test]
    fn test_create_defaults_to_persistent() {
        match Op::create("/a", "") {
            Op::Create { mode, data, .. } => {
                assert_eq!(mode, CreateMode::Persistent);
                assert!(data.is_empty());
            }
            other => panic!("unexpected op {:?}", other),
        }
    }
}

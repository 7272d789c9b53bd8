use super::Session;
use crate::core::{CreateMode, Result};
use crate::transaction::{Op, OpResult};

/// Fluent batch builder
///
/// ```ignore
/// let results = session
///     .transaction()
///     .check("/config", 4)
///     .set_data("/config", "v5", 4)
///     .create("/config/applied", "")
///     .commit()
///     .await?;
/// ```
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction<'s> {
    session: &'s Session,
    ops: Vec<Op>,
}

impl<'s> Transaction<'s> {
    pub(crate) fn new(session: &'s Session) -> Self {
        Self {
            session,
            ops: Vec::new(),
        }
    }

    /// Add a persistent create
    pub fn create(self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.op(Op::create(path, data))
    }

    /// Add a create with an explicit mode
    pub fn create_with_mode(self, path: impl Into<String>, data: impl Into<Vec<u8>>, mode: CreateMode) -> Self {
        self.op(Op::create_with_mode(path, data, mode))
    }

    /// Add a versioned delete
    pub fn delete(self, path: impl Into<String>, version: i32) -> Self {
        self.op(Op::delete(path, version))
    }

    /// Add a versioned data update
    pub fn set_data(self, path: impl Into<String>, data: impl Into<Vec<u8>>, version: i32) -> Self {
        self.op(Op::set_data(path, data, version))
    }

    /// Add a version check that mutates nothing
    pub fn check(self, path: impl Into<String>, version: i32) -> Self {
        self.op(Op::check(path, version))
    }

    /// Add an already built operation
    pub fn op(mut self, op: Op) -> Self {
        self.ops.push(op);
        self
    }

    /// Get the collected operations
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Submit the collected operations as one atomic batch.
    pub async fn commit(self) -> Result<Vec<OpResult>> {
        self.session.multi(self.ops).await
    }
}

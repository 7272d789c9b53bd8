// ============================================================================
// Batch State Management
// ============================================================================
//
// Every submitted batch moves through:
//
//   Pending -> Validating -> Committed
//                   │
//                   └──────> Aborted
//
// Committed and Aborted are terminal.
//
// ============================================================================

use super::Op;
use crate::core::{CoordError, Result, SessionId};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BATCH_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a submitted batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(pub u64);

impl BatchId {
    pub fn new() -> Self {
        BatchId(NEXT_BATCH_ID.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw id
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "batch_{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Validating,
    Committed,
    Aborted,
}

impl BatchState {
    /// Check if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Committed | BatchState::Aborted)
    }
}

impl std::fmt::Display for BatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchState::Pending => write!(f, "PENDING"),
            BatchState::Validating => write!(f, "VALIDATING"),
            BatchState::Committed => write!(f, "COMMITTED"),
            BatchState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// An ordered batch of operations on its way through the writer.
#[derive(Debug)]
pub struct Batch {
    id: BatchId,
    session: SessionId,
    ops: Vec<Op>,
    state: BatchState,
    start_time: std::time::Instant,
}

impl Batch {
    /// Create a pending batch
    pub fn new(session: SessionId, ops: Vec<Op>) -> Self {
        Self {
            id: BatchId::new(),
            session,
            ops,
            state: BatchState::Pending,
            start_time: std::time::Instant::now(),
        }
    }

    /// Get the batch ID
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Get the submitting session
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Get the batch operations
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Take the batch operations
    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    /// Number of operations in the batch
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Get the current state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Time since the batch was created
    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Move from Pending to Validating
    pub fn begin_validation(&mut self) -> Result<()> {
        self.transition(BatchState::Pending, BatchState::Validating)
    }

    /// Mark as committed
    pub fn commit(&mut self) -> Result<()> {
        self.transition(BatchState::Validating, BatchState::Committed)
    }

    /// Mark as aborted
    pub fn abort(&mut self) -> Result<()> {
        self.transition(BatchState::Validating, BatchState::Aborted)
    }

    fn transition(&mut self, from: BatchState, to: BatchState) -> Result<()> {
        if self.state != from {
            return Err(CoordError::InvalidRequest(format!(
                "Cannot move {} to {}: batch is {}",
                self.id, to, self.state
            )));
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_id_generation() {
        let id1 = BatchId::new();
        let id2 = BatchId::new();
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn test_batch_lifecycle() {
        let mut batch = Batch::new(1, vec![Op::create("/a", "")]);
        assert_eq!(batch.state(), BatchState::Pending);

        batch.begin_validation().unwrap();
        assert_eq!(batch.state(), BatchState::Validating);
        assert!(!batch.state().is_terminal());

        batch.commit().unwrap();
        assert!(batch.state().is_terminal());
    }

    #[test]
    fn test_cannot_commit_without_validation() {
        let mut batch = Batch::new(1, Vec::new());
        assert!(batch.commit().is_err());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut batch = Batch::new(1, Vec::new());
        batch.begin_validation().unwrap();
        batch.abort().unwrap();
        assert!(batch.commit().is_err());
        assert!(batch.abort().is_err());
        assert_eq!(batch.state(), BatchState::Aborted);
    }
}

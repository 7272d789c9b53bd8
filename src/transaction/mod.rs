// ============================================================================
// Multi-op Transaction Module
// ============================================================================
//
// Atomic batches without an undo log: a batch is first validated entirely
// against an overlay, then committed entirely. Nothing reaches the tree
// readers see until every operation has been proven valid.
//
// Flow:
//   Op list -> validator (overlay) -> committer (next tree + change-set)
//           -> journal -> publish -> watches
//
// ============================================================================

pub mod change;
pub mod committer;
pub mod engine;
pub mod op;
pub mod overlay;
pub mod result;
pub mod state;
pub mod validator;

pub use change::{ChangeEvent, EventType};
pub use engine::{EngineStats, SharedTree, TransactionEngine, replay};
pub use op::Op;
pub use result::{OpResult, ValidationFailure};
pub use state::{Batch, BatchId, BatchState};
pub use validator::{BatchContext, Mutation, ValidatedBatch};

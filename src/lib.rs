// ============================================================================
// coordtree Library
// ============================================================================
//
// Hierarchical coordination store with atomic multi-op batches and one-shot
// watch notifications.
//
// Layers:
//   core        - paths, stats, error codes
//   storage     - persistent namespace tree, change journal
//   transaction - validate/commit engine for multi-op batches
//   watch       - registrations and per-session delivery
//   facade      - single-writer store service
//   connection  - sessions, batch builder, configuration
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod facade;
pub mod storage;
pub mod transaction;
pub mod watch;

pub use connection::{Session, StoreConfig, Transaction};
pub use core::{ANY_VERSION, CoordError, CreateMode, ErrorCode, Result, SessionId, Stat, Zxid};
pub use facade::CoordinationStore;
pub use storage::{DurabilityMode, NamespaceTree};
pub use transaction::{EventType, Op, OpResult};
pub use watch::{EventMask, Notification, WatchHandle, WatchedEvent};

/// Open an in-memory store and connect one session to it.
///
/// # Examples
///
/// ```
/// use coordtree::{Op, OpResult};
///
/// # async fn demo() -> coordtree::Result<()> {
/// let session = coordtree::connect().await?;
/// let results = session
///     .multi(vec![Op::create("/app", "cfg"), Op::check("/app", 0)])
///     .await?;
/// assert_eq!(results[1], OpResult::Check);
/// # Ok(())
/// # }
/// ```
pub async fn connect() -> Result<Session> {
    CoordinationStore::in_memory().await?.connect()
}

// ============================================================================
// Transaction Engine
// ============================================================================
//
// Runs one batch at a time: validate against the published tree, fold the
// batch into the next version, journal it, publish the version, then fire
// watches. A fault after validation halts the engine for good.
//
// ============================================================================

use super::committer::{self, Commit};
use super::result::{OpResult, batch_error};
use super::state::Batch;
use super::validator::{self, BatchContext};
use super::Op;
use crate::core::{CoordError, Result, SessionId, Zxid};
use crate::storage::{ChangeLog, JournalRecord, NamespaceTree};
use crate::watch::{EventMask, WatchHandle, WatchManager};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{Instrument, Level, event, info_span};

/// Published tree version shared with readers (copy-on-write swap).
pub type SharedTree = Arc<RwLock<Arc<NamespaceTree>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub committed: u64,
    pub aborted: u64,
    pub watches_fired: u64,
}

pub struct TransactionEngine {
    tree: SharedTree,
    watches: Arc<WatchManager>,
    journal: Box<dyn ChangeLog>,
    halted: Option<String>,
    stats: EngineStats,
}

impl TransactionEngine {
    /// Create an engine publishing `tree` as its first version
    pub fn new(tree: NamespaceTree, watches: Arc<WatchManager>, journal: Box<dyn ChangeLog>) -> Self {
        Self {
            tree: Arc::new(RwLock::new(Arc::new(tree))),
            watches,
            journal,
            halted: None,
            stats: EngineStats::default(),
        }
    }

    /// Handle readers use to reach the published tree.
    pub fn shared_tree(&self) -> SharedTree {
        Arc::clone(&self.tree)
    }

    /// Get batch counters
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Check if a commit fault stopped the engine
    pub fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Zxid of the published tree version
    pub async fn last_zxid(&self) -> Zxid {
        self.tree.read().await.last_zxid()
    }

    /// Validate and apply `ops` as one atomic unit.
    pub async fn submit(&mut self, session: SessionId, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        if let Some(reason) = &self.halted {
            return Err(CoordError::WriterHalted(reason.clone()));
        }

        let batch = Batch::new(session, ops);
        let span = info_span!(
            "coordtree.batch",
            batch = %batch.id(),
            session = session,
            ops = batch.len()
        );
        self.run_batch(batch).instrument(span).await
    }

    async fn run_batch(&mut self, mut batch: Batch) -> Result<Vec<OpResult>> {
        let session = batch.session();
        let current = Arc::clone(&*self.tree.read().await);
        let ctx = BatchContext {
            zxid: current.last_zxid() + 1,
            time: Utc::now().timestamp_millis(),
            session,
        };

        batch.begin_validation()?;
        let validated = match validator::validate(&current, batch.ops(), ctx) {
            Ok(validated) => validated,
            Err(failure) => {
                batch.abort()?;
                self.stats.aborted += 1;
                event!(
                    Level::DEBUG,
                    index = failure.index,
                    path = %failure.path,
                    code = %failure.code,
                    "batch aborted"
                );
                return Err(batch_error(batch.len(), failure));
            }
        };

        if validated.is_read_only() {
            batch.commit()?;
            self.stats.committed += 1;
            event!(Level::DEBUG, "read-only batch committed");
            return Ok(validated.results);
        }

        let Commit {
            ctx,
            tree,
            events,
            results,
        } = committer::commit(&current, validated);

        let record = JournalRecord {
            zxid: ctx.zxid,
            time: ctx.time,
            session,
            ops: batch.ops().to_vec(),
            events,
        };
        if let Err(err) = self.journal.append(&record) {
            let reason = format!("journal append failed at zxid {:#x}: {}", ctx.zxid, err);
            event!(Level::ERROR, error = %err, zxid = ctx.zxid, "commit fault, halting writer");
            self.halted = Some(reason.clone());
            batch.abort()?;
            return Err(CoordError::WriterHalted(reason));
        }

        *self.tree.write().await = Arc::new(tree);
        batch.commit()?;
        self.stats.committed += 1;

        // the batch is durable and visible; a delivery fault only stops later batches
        let fired = match self.watches.publish(ctx.zxid, &record.events) {
            Ok(fired) => fired,
            Err(err) => {
                event!(Level::ERROR, error = %err, zxid = ctx.zxid, "watch publish fault, halting writer");
                self.halted = Some(format!("watch publish failed at zxid {:#x}: {}", ctx.zxid, err));
                return Ok(results);
            }
        };
        self.stats.watches_fired += fired as u64;
        event!(
            Level::DEBUG,
            zxid = ctx.zxid,
            events = record.events.len(),
            fired = fired,
            elapsed_us = batch.duration().as_micros() as u64,
            "batch committed"
        );
        Ok(results)
    }

    /// Register a watch and take the published tree in one step, so no
    /// batch can commit between the two. With `require_node`, nothing is
    /// registered when `watched` does not exist.
    pub async fn watch_and_read(
        &self,
        session: SessionId,
        watched: &str,
        mask: EventMask,
        require_node: bool,
    ) -> Result<(Arc<NamespaceTree>, Option<WatchHandle>)> {
        let tree = Arc::clone(&*self.tree.read().await);
        if require_node && !tree.exists(watched) {
            return Ok((tree, None));
        }
        let handle = self.watches.register(session, watched, mask)?;
        Ok((tree, Some(handle)))
    }

    /// Sync barrier for `session`. Ordered behind every earlier request, so
    /// all notifications of earlier batches are already queued.
    pub async fn sync(&self, session: SessionId) -> Result<Zxid> {
        let zxid = self.last_zxid().await;
        self.watches.barrier(session, zxid)?;
        Ok(zxid)
    }
}

/// Rebuild a tree by running journaled batches through validation and
/// commit again. Replay is deterministic because each record carries the
/// zxid, time and session the batch originally committed with.
pub fn replay(records: &[JournalRecord]) -> Result<NamespaceTree> {
    let mut tree = NamespaceTree::new();
    for record in records {
        if record.zxid <= tree.last_zxid() {
            return Err(CoordError::Journal(format!(
                "zxid {:#x} is not after {:#x}",
                record.zxid,
                tree.last_zxid()
            )));
        }
        let ctx = BatchContext {
            zxid: record.zxid,
            time: record.time,
            session: record.session,
        };
        let validated = validator::validate(&tree, &record.ops, ctx).map_err(|failure| {
            CoordError::Journal(format!(
                "replay of zxid {:#x} failed at op {} ({}): {}",
                record.zxid, failure.index, failure.path, failure.code
            ))
        })?;
        tree = committer::commit(&tree, validated).tree;
    }
    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;
    use crate::storage::NullChangeLog;
    use crate::watch::Notification;

    struct FailingLog;

    impl ChangeLog for FailingLog {
        fn append(&mut self, _record: &JournalRecord) -> Result<()> {
            Err(CoordError::IoError("disk full".into()))
        }

        fn appended(&self) -> u64 {
            0
        }
    }

    /// Journal that keeps records in memory for replay checks.
    #[derive(Default)]
    struct MemoryLog(Arc<std::sync::Mutex<Vec<JournalRecord>>>);

    impl ChangeLog for MemoryLog {
        fn append(&mut self, record: &JournalRecord) -> Result<()> {
            self.0.lock()?.push(record.clone());
            Ok(())
        }

        fn appended(&self) -> u64 {
            self.0.lock().map(|r| r.len() as u64).unwrap_or(0)
        }
    }

    fn engine() -> TransactionEngine {
        TransactionEngine::new(
            NamespaceTree::new(),
            Arc::new(WatchManager::new()),
            Box::new(NullChangeLog::default()),
        )
    }

    #[tokio::test]
    async fn test_submit_commits_and_advances_zxid() {
        let mut engine = engine();
        let results = engine
            .submit(1, vec![Op::create("/x", ""), Op::delete("/x", 0)])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(matches!(&results[0], OpResult::Create { path, .. } if path == "/x"));
        assert_eq!(results[1], OpResult::Delete);
        assert_eq!(engine.last_zxid().await, 1);
        assert!(!engine.shared_tree().read().await.exists("/x"));
        assert_eq!(engine.stats().committed, 1);
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_tree_untouched() {
        let mut engine = engine();
        let before = Arc::clone(&*engine.shared_tree().read().await);

        let err = engine
            .submit(1, vec![Op::create("/m", ""), Op::delete("/m", 1)])
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::BadVersion));

        let after = Arc::clone(&*engine.shared_tree().read().await);
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(engine.last_zxid().await, 0);
        assert_eq!(engine.stats().aborted, 1);
    }

    #[tokio::test]
    async fn test_read_only_batch_consumes_no_zxid() {
        let mut engine = engine();
        assert!(engine.submit(1, Vec::new()).await.unwrap().is_empty());
        assert_eq!(engine.submit(1, vec![Op::check("/", -1)]).await.unwrap(), vec![OpResult::Check]);
        assert_eq!(engine.last_zxid().await, 0);
    }

    #[tokio::test]
    async fn test_journal_fault_halts_writer() {
        let watches = Arc::new(WatchManager::new());
        let mut rx = watches.attach(1).unwrap();
        watches.register(1, "/", EventMask::CHILDREN).unwrap();
        let mut engine = TransactionEngine::new(NamespaceTree::new(), Arc::clone(&watches), Box::new(FailingLog));

        let err = engine.submit(1, vec![Op::create("/a", "")]).await.unwrap_err();
        assert!(matches!(err, CoordError::WriterHalted(_)));
        assert!(engine.is_halted());
        assert!(!engine.shared_tree().read().await.exists("/a"));
        assert!(rx.try_recv().is_err());

        let err = engine.submit(1, vec![Op::check("/", -1)]).await.unwrap_err();
        assert!(matches!(err, CoordError::WriterHalted(_)));
    }

    #[tokio::test]
    async fn test_publish_fault_keeps_batch_and_halts_writer() {
        let watches = Arc::new(WatchManager::new());
        let _rx = watches.attach(1).unwrap();
        let mut engine = TransactionEngine::new(NamespaceTree::new(), Arc::clone(&watches), Box::new(NullChangeLog::default()));
        watches.poison();

        let results = engine.submit(1, vec![Op::create("/a", "")]).await.unwrap();
        assert!(matches!(&results[0], OpResult::Create { path, .. } if path == "/a"));
        assert!(engine.shared_tree().read().await.exists("/a"));
        assert_eq!(engine.stats().committed, 1);
        assert!(engine.is_halted());

        let err = engine.submit(1, vec![Op::create("/b", "")]).await.unwrap_err();
        assert!(matches!(err, CoordError::WriterHalted(_)));
    }

    #[tokio::test]
    async fn test_watch_and_read_skips_missing_node() {
        let watches = Arc::new(WatchManager::new());
        let _rx = watches.attach(1).unwrap();
        let mut engine = TransactionEngine::new(NamespaceTree::new(), Arc::clone(&watches), Box::new(NullChangeLog::default()));
        engine.submit(1, vec![Op::create("/a", "v")]).await.unwrap();

        let (tree, handle) = engine.watch_and_read(1, "/a", EventMask::DATA, true).await.unwrap();
        assert_eq!(tree.lookup("/a").unwrap().data(), b"v");
        assert!(handle.is_some());

        let (_, handle) = engine.watch_and_read(1, "/none", EventMask::DATA, true).await.unwrap();
        assert!(handle.is_none());
        let (_, handle) = engine.watch_and_read(1, "/none", EventMask::DATA, false).await.unwrap();
        assert!(handle.is_some());
        assert_eq!(watches.registration_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sync_marks_last_zxid() {
        let watches = Arc::new(WatchManager::new());
        let mut rx = watches.attach(4).unwrap();
        let mut engine = TransactionEngine::new(NamespaceTree::new(), watches, Box::new(NullChangeLog::default()));
        engine.submit(4, vec![Op::create("/a", "")]).await.unwrap();

        assert_eq!(engine.sync(4).await.unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), Notification::Synced { zxid: 1 });
    }

    #[tokio::test]
    async fn test_replay_rebuilds_tree() {
        let log = MemoryLog::default();
        let records = Arc::clone(&log.0);
        let mut engine = TransactionEngine::new(NamespaceTree::new(), Arc::new(WatchManager::new()), Box::new(log));

        engine.submit(1, vec![Op::create("/a", "1"), Op::create("/a/b", "2")]).await.unwrap();
        engine.submit(1, vec![Op::set_data("/a", "3", 0)]).await.unwrap();
        let _ = engine.submit(1, vec![Op::delete("/a", -1)]).await;
        engine.submit(1, vec![Op::delete("/a/b", 0)]).await.unwrap();

        let records = records.lock().unwrap().clone();
        assert_eq!(records.len(), 3);
        let rebuilt = replay(&records).unwrap();
        assert_eq!(&rebuilt, &**engine.shared_tree().read().await);
    }

    #[test]
    fn test_replay_rejects_out_of_order_records() {
        let record = JournalRecord {
            zxid: 0,
            time: 0,
            session: 1,
            ops: vec![Op::create("/a", "")],
            events: Vec::new(),
        };
        assert!(matches!(replay(&[record]), Err(CoordError::Journal(_))));
    }
}

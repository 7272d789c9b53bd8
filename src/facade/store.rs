use crate::connection::{Session, StoreConfig};
use crate::core::{CoordError, Result, SessionId, Zxid};
use crate::storage::{ChangeLog, DurabilityMode, FileChangeLog, NamespaceTree, NullChangeLog};
use crate::transaction::{Op, OpResult, SharedTree, TransactionEngine, replay};
use crate::watch::{EventMask, WatchHandle, WatchManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, event};

/// Work item for the writer, processed strictly in arrival order.
enum Request {
    Submit {
        session: SessionId,
        ops: Vec<Op>,
        reply: oneshot::Sender<Result<Vec<OpResult>>>,
    },
    Sync {
        session: SessionId,
        reply: oneshot::Sender<Result<Zxid>>,
    },
    Watch {
        session: SessionId,
        path: String,
        mask: EventMask,
        require_node: bool,
        reply: oneshot::Sender<Result<WatchedRead>>,
    },
}

/// Tree version a watch was registered against, and the registration.
pub type WatchedRead = (Arc<NamespaceTree>, Option<WatchHandle>);

/// Handle to a running coordination store.
///
/// All mutations go through one writer task fed by a FIFO queue, which is
/// the total order of the store. Reads go straight to the last published
/// tree version and never wait for the writer.
#[derive(Clone)]
pub struct CoordinationStore {
    requests: mpsc::Sender<Request>,
    tree: SharedTree,
    watches: Arc<WatchManager>,
    config: Arc<StoreConfig>,
    next_session: Arc<AtomicU64>,
}

impl CoordinationStore {
    /// Start a store. With a journal configured, committed batches found in
    /// it are replayed first.
    pub async fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let mut first_session = 1;
        let (tree, journal): (NamespaceTree, Box<dyn ChangeLog>) = match &config.journal_path {
            Some(path) if config.durability != DurabilityMode::None => {
                let (journal, records) = FileChangeLog::recover(path, config.durability)?;
                let tree = replay(&records)?;
                first_session = records.iter().map(|r| r.session).max().unwrap_or(0) + 1;
                event!(
                    Level::INFO,
                    journal = %path.display(),
                    records = records.len(),
                    last_zxid = tree.last_zxid(),
                    "journal replayed"
                );
                (tree, Box::new(journal))
            }
            _ => (NamespaceTree::new(), Box::new(NullChangeLog::default())),
        };

        let watches = Arc::new(WatchManager::new());
        let engine = TransactionEngine::new(tree, Arc::clone(&watches), journal);
        let tree = engine.shared_tree();
        let (requests, queue) = mpsc::channel(config.queue_capacity);
        tokio::spawn(run_writer(engine, queue));

        Ok(Self {
            requests,
            tree,
            watches,
            config: Arc::new(config),
            next_session: Arc::new(AtomicU64::new(first_session)),
        })
    }

    /// Store without a journal.
    pub async fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::default()).await
    }

    /// Configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Registration table shared with the writer.
    pub fn watch_manager(&self) -> &Arc<WatchManager> {
        &self.watches
    }

    /// Open a session with its own notification channel.
    pub fn connect(&self) -> Result<Session> {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let notifications = self.watches.attach(id)?;
        Ok(Session::new(id, self.clone(), notifications))
    }

    /// Last published tree version.
    pub async fn snapshot(&self) -> Arc<NamespaceTree> {
        Arc::clone(&*self.tree.read().await)
    }

    /// Queue a batch behind every earlier request and wait for its outcome.
    pub async fn submit(&self, session: SessionId, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        self.check_limits(&ops)?;
        let (reply, outcome) = oneshot::channel();
        self.send(Request::Submit {
            session,
            ops,
            reply,
        })
        .await?;
        outcome
            .await
            .map_err(|_| CoordError::ChannelClosed("writer dropped the batch".to_string()))?
    }

    /// Queue a sync barrier for `session`; resolves once the marker is on
    /// the session's channel.
    pub async fn sync(&self, session: SessionId) -> Result<Zxid> {
        let (reply, outcome) = oneshot::channel();
        self.send(Request::Sync { session, reply }).await?;
        outcome
            .await
            .map_err(|_| CoordError::ChannelClosed("writer dropped the sync".to_string()))?
    }

    /// Register a watch through the writer queue and return the tree version
    /// it was registered against. Every batch committed after that version
    /// fires the registration; none committed before it does.
    pub async fn watch_and_read(
        &self,
        session: SessionId,
        watched: &str,
        mask: EventMask,
        require_node: bool,
    ) -> Result<WatchedRead> {
        let (reply, outcome) = oneshot::channel();
        self.send(Request::Watch {
            session,
            path: watched.to_string(),
            mask,
            require_node,
            reply,
        })
        .await?;
        outcome
            .await
            .map_err(|_| CoordError::ChannelClosed("writer dropped the watch".to_string()))?
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| CoordError::ChannelClosed("writer stopped".to_string()))
    }

    fn check_limits(&self, ops: &[Op]) -> Result<()> {
        if ops.len() > self.config.max_batch_ops {
            return Err(CoordError::InvalidRequest(format!(
                "batch of {} ops exceeds max_batch_ops {}",
                ops.len(),
                self.config.max_batch_ops
            )));
        }
        if let Some(op) = ops.iter().find(|op| op.payload_len() > self.config.max_data_bytes) {
            return Err(CoordError::InvalidRequest(format!(
                "{} on {} carries {} bytes, limit is {}",
                op.name(),
                op.path(),
                op.payload_len(),
                self.config.max_data_bytes
            )));
        }
        Ok(())
    }
}

async fn run_writer(mut engine: TransactionEngine, mut queue: mpsc::Receiver<Request>) {
    event!(Level::DEBUG, "writer started");
    while let Some(request) = queue.recv().await {
        match request {
            Request::Submit {
                session,
                ops,
                reply,
            } => {
                let outcome = engine.submit(session, ops).await;
                let _ = reply.send(outcome);
            }
            Request::Sync { session, reply } => {
                let _ = reply.send(engine.sync(session).await);
            }
            Request::Watch {
                session,
                path,
                mask,
                require_node,
                reply,
            } => {
                let _ = reply.send(engine.watch_and_read(session, &path, mask, require_node).await);
            }
        }
    }
    let stats = engine.stats();
    event!(
        Level::DEBUG,
        committed = stats.committed,
        aborted = stats.aborted,
        "writer stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorCode;

    #[tokio::test]
    async fn test_submit_through_writer() {
        let store = CoordinationStore::in_memory().await.unwrap();
        let results = store.submit(1, vec![Op::create("/a", "x")]).await.unwrap();
        assert_eq!(results.len(), 1);

        let snapshot = store.snapshot().await;
        assert_eq!(snapshot.lookup("/a").unwrap().data(), b"x");
        assert_eq!(snapshot.last_zxid(), 1);
    }

    #[tokio::test]
    async fn test_limits_reject_before_queueing() {
        let store = CoordinationStore::open(StoreConfig::new().max_batch_ops(1).max_data_bytes(2))
            .await
            .unwrap();

        let err = store
            .submit(1, vec![Op::create("/a", ""), Op::create("/b", "")])
            .await
            .unwrap_err();
        assert!(matches!(err, CoordError::InvalidRequest(_)));

        let err = store.submit(1, vec![Op::create("/a", "xyz")]).await.unwrap_err();
        assert!(matches!(err, CoordError::InvalidRequest(_)));
        assert_eq!(store.snapshot().await.last_zxid(), 0);
    }

    #[tokio::test]
    async fn test_batches_apply_in_queue_order() {
        let store = CoordinationStore::in_memory().await.unwrap();
        let first = store.submit(1, vec![Op::create("/a", "")]);
        let second = store.submit(2, vec![Op::create("/a", "")]);
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().code(), Some(ErrorCode::NodeExists));
    }

    #[tokio::test]
    async fn test_sessions_get_distinct_ids() {
        let store = CoordinationStore::in_memory().await.unwrap();
        let a = store.connect().unwrap();
        let b = store.connect().unwrap();
        assert_ne!(a.id(), b.id());
    }
}

pub mod config;
pub mod transaction;

use crate::core::{CoordError, CreateMode, ErrorCode, Result, SessionId, Stat, Zxid, path};
use crate::facade::CoordinationStore;
use crate::transaction::{Op, OpResult};
use crate::watch::{EventMask, Notification, WatchHandle, WatchedEvent};
use tokio::sync::mpsc;

pub use config::StoreConfig;
pub use transaction::Transaction;

/// Client session
///
/// Owns the session's notification channel and the ephemeral-owner id its
/// creates are stamped with. Similar to a ZooKeeper handle: single-op calls
/// are one-op batches, reads come from the last published tree.
pub struct Session {
    id: SessionId,
    store: CoordinationStore,
    notifications: mpsc::UnboundedReceiver<Notification>,
    state: SessionState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Closed,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        store: CoordinationStore,
        notifications: mpsc::UnboundedReceiver<Notification>,
    ) -> Self {
        Self {
            id,
            store,
            notifications,
            state: SessionState::Active,
        }
    }

    /// Session id, also the owner stamped on ephemeral nodes
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Check if the session is still open
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(CoordError::SessionClosed(self.id));
        }
        Ok(())
    }

    /// Submit `ops` as one atomic batch.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let results = session
    ///     .multi(vec![Op::create("/app", ""), Op::create("/app/lock", "")])
    ///     .await?;
    /// ```
    pub async fn multi(&self, ops: Vec<Op>) -> Result<Vec<OpResult>> {
        self.ensure_active()?;
        self.store.submit(self.id, ops).await
    }

    /// Start a fluent batch bound to this session.
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    async fn single(&self, op: Op) -> Result<OpResult> {
        match self.multi(vec![op]).await {
            Ok(mut results) => results
                .pop()
                .ok_or_else(|| CoordError::InvalidRequest("writer returned no result".to_string())),
            Err(CoordError::TransactionFailed { path, code, .. }) => Err(CoordError::Operation { path, code }),
            Err(other) => Err(other),
        }
    }

    /// Create a persistent node. Returns the path actually created.
    pub async fn create(&self, node_path: &str, data: impl Into<Vec<u8>>) -> Result<String> {
        self.create_with_mode(node_path, data, CreateMode::Persistent).await
    }

    /// Create a node with the given mode. Sequential modes append the
    /// parent's counter to the name.
    pub async fn create_with_mode(
        &self,
        node_path: &str,
        data: impl Into<Vec<u8>>,
        mode: CreateMode,
    ) -> Result<String> {
        match self.single(Op::create_with_mode(node_path, data, mode)).await? {
            OpResult::Create { path, .. } => Ok(path),
            other => Err(unexpected("create", other)),
        }
    }

    /// Delete a childless node if its version matches (-1 matches any).
    pub async fn delete(&self, node_path: &str, version: i32) -> Result<()> {
        match self.single(Op::delete(node_path, version)).await? {
            OpResult::Delete => Ok(()),
            other => Err(unexpected("delete", other)),
        }
    }

    /// Replace a node's data if its version matches. Returns the new stat.
    pub async fn set_data(&self, node_path: &str, data: impl Into<Vec<u8>>, version: i32) -> Result<Stat> {
        match self.single(Op::set_data(node_path, data, version)).await? {
            OpResult::SetData { stat } => Ok(stat),
            other => Err(unexpected("set_data", other)),
        }
    }

    /// Stat of the node, or `None` if it does not exist
    pub async fn exists(&self, node_path: &str) -> Result<Option<Stat>> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let tree = self.store.snapshot().await;
        Ok(tree.lookup(node_path).map(|node| *node.stat()))
    }

    /// Data and stat of the node
    pub async fn get_data(&self, node_path: &str) -> Result<(Vec<u8>, Stat)> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let tree = self.store.snapshot().await;
        tree.lookup(node_path)
            .map(|node| (node.data().to_vec(), *node.stat()))
            .ok_or_else(|| no_node(node_path))
    }

    /// Child names of the node
    pub async fn get_children(&self, node_path: &str) -> Result<Vec<String>> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let tree = self.store.snapshot().await;
        tree.children(node_path).ok_or_else(|| no_node(node_path))
    }

    // Watched reads register through the writer queue and read the tree
    // version the registration was made against, so an event reported for
    // the registration always comes from a batch the read did not see.

    /// `exists` plus a registration for creation, deletion and data changes.
    /// The registration is kept even when the node is absent.
    pub async fn exists_watch(&self, node_path: &str) -> Result<(Option<Stat>, WatchHandle)> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let (tree, handle) = self
            .store
            .watch_and_read(self.id, node_path, EventMask::DATA, false)
            .await?;
        let handle = handle.ok_or_else(|| CoordError::InvalidRequest("watch was not registered".to_string()))?;
        Ok((tree.lookup(node_path).map(|node| *node.stat()), handle))
    }

    /// `get_data` plus a data registration. Nothing is registered if the
    /// node does not exist.
    pub async fn get_data_watch(&self, node_path: &str) -> Result<(Vec<u8>, Stat, WatchHandle)> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let (tree, handle) = self
            .store
            .watch_and_read(self.id, node_path, EventMask::DATA, true)
            .await?;
        match (tree.lookup(node_path), handle) {
            (Some(node), Some(handle)) => Ok((node.data().to_vec(), *node.stat(), handle)),
            _ => Err(no_node(node_path)),
        }
    }

    /// `get_children` plus a registration for child changes and deletion.
    /// Nothing is registered if the node does not exist.
    pub async fn get_children_watch(&self, node_path: &str) -> Result<(Vec<String>, WatchHandle)> {
        self.ensure_active()?;
        path::validate(node_path)?;
        let (tree, handle) = self
            .store
            .watch_and_read(self.id, node_path, EventMask::CHILDREN, true)
            .await?;
        match (tree.children(node_path), handle) {
            (Some(children), Some(handle)) => Ok((children, handle)),
            _ => Err(no_node(node_path)),
        }
    }

    /// Register a one-shot watch on `node_path` for the kinds in `mask`.
    /// Takes effect immediately, outside the writer queue.
    pub fn watch(&self, node_path: &str, mask: EventMask) -> Result<WatchHandle> {
        self.ensure_active()?;
        self.store.watch_manager().register(self.id, node_path, mask)
    }

    /// Remove a registration. Returns false if it already fired.
    pub fn cancel_watch(&self, handle: WatchHandle) -> Result<bool> {
        self.store.watch_manager().cancel(handle)
    }

    /// Wait for the next notification. `None` once the session is closed.
    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    /// Next notification if one is already queued
    pub fn try_next_notification(&mut self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }

    /// Queue a barrier behind every request submitted so far. Once the
    /// returned zxid's marker is read, every notification of earlier
    /// batches has been read too.
    pub async fn sync(&self) -> Result<Zxid> {
        self.ensure_active()?;
        self.store.sync(self.id).await
    }

    /// Sync, then collect the events delivered ahead of the marker.
    pub async fn drain_until_synced(&mut self) -> Result<Vec<WatchedEvent>> {
        let target = self.sync().await?;
        let mut events = Vec::new();
        loop {
            match self.notifications.recv().await {
                Some(Notification::Event(event)) => events.push(event),
                Some(Notification::Synced { zxid }) if zxid == target => return Ok(events),
                // marker of an earlier sync that nobody drained
                Some(Notification::Synced { .. }) => {}
                None => return Err(CoordError::SessionClosed(self.id)),
            }
        }
    }

    /// Close the session and drop its watch registrations.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        self.store.watch_manager().detach(self.id)?;
        self.notifications.close();
        self.state = SessionState::Closed;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn no_node(node_path: &str) -> CoordError {
    CoordError::Operation {
        path: node_path.to_string(),
        code: ErrorCode::NoNode,
    }
}

fn unexpected(call: &str, result: OpResult) -> CoordError {
    CoordError::InvalidRequest(format!("{} returned {:?}", call, result))
}

// ============================================================================
// Watch Manager
// ============================================================================
//
// Registrations are one-shot: publish() removes every registration it fires
// before returning. Notifications travel through one unbounded channel per
// session, so a session sees them in commit order.
//
// ============================================================================

use super::event::{EventMask, Notification, WatchHandle, WatchedEvent};
use crate::core::{CoordError, Result, SessionId, Zxid, path};
use crate::transaction::ChangeEvent;
use log::{debug, trace};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy)]
struct Registration {
    handle: WatchHandle,
    session: SessionId,
    mask: EventMask,
}

#[derive(Debug, Default)]
struct WatchTable {
    next_handle: u64,
    by_path: HashMap<String, Vec<Registration>>,
    /// handle -> registered path, for cancellation
    handles: HashMap<WatchHandle, String>,
    sessions: HashMap<SessionId, mpsc::UnboundedSender<Notification>>,
}

impl WatchTable {
    fn unlink(&mut self, handle: WatchHandle) -> bool {
        let Some(watched) = self.handles.remove(&handle) else {
            return false;
        };
        if let Some(regs) = self.by_path.get_mut(&watched) {
            regs.retain(|r| r.handle != handle);
            if regs.is_empty() {
                self.by_path.remove(&watched);
            }
        }
        true
    }

    fn deliver(&mut self, session: SessionId, notification: Notification) -> bool {
        let Some(tx) = self.sessions.get(&session) else {
            return false;
        };
        if tx.send(notification).is_err() {
            debug!("session {} stopped listening, dropping its channel", session);
            self.sessions.remove(&session);
            return false;
        }
        true
    }
}

#[derive(Debug, Default)]
pub struct WatchManager {
    table: Mutex<WatchTable>,
}

impl WatchManager {
    /// Create an empty registration table
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the delivery channel of a session.
    pub fn attach(&self, session: SessionId) -> Result<mpsc::UnboundedReceiver<Notification>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut table = self.table.lock()?;
        if table.sessions.contains_key(&session) {
            return Err(CoordError::InvalidRequest(format!(
                "session {} is already attached",
                session
            )));
        }
        table.sessions.insert(session, tx);
        Ok(rx)
    }

    /// Close a session's channel and drop its registrations.
    pub fn detach(&self, session: SessionId) -> Result<usize> {
        let mut table = self.table.lock()?;
        table.sessions.remove(&session);
        let owned: Vec<WatchHandle> = table
            .by_path
            .values()
            .flatten()
            .filter(|r| r.session == session)
            .map(|r| r.handle)
            .collect();
        for handle in &owned {
            table.unlink(*handle);
        }
        Ok(owned.len())
    }

    /// Add a one-shot registration for the kinds in `mask`. The session must be attached.
    pub fn register(&self, session: SessionId, watched: &str, mask: EventMask) -> Result<WatchHandle> {
        path::validate(watched)?;
        if mask.is_empty() {
            return Err(CoordError::InvalidRequest("empty watch mask".to_string()));
        }
        let mut table = self.table.lock()?;
        if !table.sessions.contains_key(&session) {
            return Err(CoordError::SessionClosed(session));
        }
        table.next_handle += 1;
        let handle = WatchHandle(table.next_handle);
        table
            .by_path
            .entry(watched.to_string())
            .or_default()
            .push(Registration {
                handle,
                session,
                mask,
            });
        table.handles.insert(handle, watched.to_string());
        trace!("{} registered on {} by session {}", handle, watched, session);
        Ok(handle)
    }

    /// Remove a registration. Returns false if it already fired or was cancelled.
    pub fn cancel(&self, handle: WatchHandle) -> Result<bool> {
        let mut table = self.table.lock()?;
        Ok(table.unlink(handle))
    }

    /// Fire every registration matching the committed change-set. Must only
    /// be called with the events of a committed batch.
    pub fn publish(&self, zxid: Zxid, events: &[ChangeEvent]) -> Result<usize> {
        let mut table = self.table.lock()?;
        let mut fired = 0;

        for event in events {
            let Some(regs) = table.by_path.get_mut(&event.path) else {
                continue;
            };
            let (matched, kept): (Vec<Registration>, Vec<Registration>) =
                regs.drain(..).partition(|r| r.mask.contains(event.kind));
            if kept.is_empty() {
                table.by_path.remove(&event.path);
            } else {
                table.by_path.insert(event.path.clone(), kept);
            }

            for registration in matched {
                table.handles.remove(&registration.handle);
                let notification = Notification::Event(WatchedEvent {
                    handle: registration.handle,
                    path: event.path.clone(),
                    kind: event.kind,
                    zxid,
                });
                if table.deliver(registration.session, notification) {
                    fired += 1;
                }
            }
        }

        if fired > 0 {
            debug!("zxid {:#x} fired {} watches", zxid, fired);
        }
        Ok(fired)
    }

    /// Queue a sync marker behind everything already delivered to `session`.
    pub fn barrier(&self, session: SessionId, zxid: Zxid) -> Result<()> {
        let mut table = self.table.lock()?;
        if table.deliver(session, Notification::Synced { zxid }) {
            Ok(())
        } else {
            Err(CoordError::SessionClosed(session))
        }
    }

    /// Poison the table lock by panicking while holding it.
    #[cfg(test)]
    pub(crate) fn poison(self: &std::sync::Arc<Self>) {
        let manager = std::sync::Arc::clone(self);
        let _ = std::thread::spawn(move || {
            let _table = manager.table.lock();
            panic!("poisoning watch table");
        })
        .join();
    }

    /// Registrations waiting on any path.
    pub fn registration_count(&self) -> Result<usize> {
        Ok(self.table.lock()?.handles.len())
    }

    /// Registrations currently waiting on `watched`.
    pub fn watching(&self, watched: &str) -> Result<Vec<WatchHandle>> {
        let table = self.table.lock()?;
        Ok(table
            .by_path
            .get(watched)
            .map(|regs| regs.iter().map(|r| r.handle).collect())
            .unwrap_or_default())
    }
}

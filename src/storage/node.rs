use crate::core::{SessionId, Stat, Zxid};
use im::OrdSet;
use serde::{Deserialize, Serialize};

/// A single entry of the namespace: opaque data, metadata and child names.
///
/// The same mutation helpers are used by the tree itself and by the
/// transaction overlay, so a staged node always looks exactly like the node
/// the commit will produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    data: Vec<u8>,
    stat: Stat,
    children: OrdSet<String>,
}

impl Node {
    /// New childless node created at `zxid`
    pub fn new(data: Vec<u8>, zxid: Zxid, time: i64, ephemeral_owner: SessionId) -> Self {
        let stat = Stat::created(zxid, time, data.len(), ephemeral_owner);
        Self {
            data,
            stat,
            children: OrdSet::new(),
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(Vec::new(), 0, 0, 0)
    }

    /// Get the node's payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get the node's version counters
    pub fn stat(&self) -> &Stat {
        &self.stat
    }

    /// Child names in sorted order
    pub fn children(&self) -> impl Iterator<Item = &String> {
        self.children.iter()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.contains(name)
    }

    pub(crate) fn link_child(&mut self, name: &str, zxid: Zxid) {
        self.children.insert(name.to_string());
        self.bump_children(zxid);
    }

    pub(crate) fn unlink_child(&mut self, name: &str, zxid: Zxid) {
        self.children.remove(name);
        self.bump_children(zxid);
    }

    fn bump_children(&mut self, zxid: Zxid) {
        self.stat.cversion += 1;
        self.stat.pzxid = zxid;
        self.stat.num_children = self.children.len();
    }

    /// Replace the payload and bump the data version
    pub(crate) fn update_data(&mut self, data: Vec<u8>, zxid: Zxid, time: i64) {
        self.stat.data_length = data.len();
        self.stat.version += 1;
        self.stat.mzxid = zxid;
        self.stat.mtime = time;
        self.data = data;
    }
}

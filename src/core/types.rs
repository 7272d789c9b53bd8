use serde::{Deserialize, Serialize};

/// Commit sequence number assigned by the writer to each committed batch.
pub type Zxid = u64;

/// Identifier of a client session.
pub type SessionId = u64;

/// `expected_version` value that skips the version check.
pub const ANY_VERSION: i32 = -1;

/// Persistence kind of a node.
///
/// Ephemeral nodes record the session that created them; expiring them is
/// left to the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CreateMode {
    #[default]
    Persistent,
    PersistentSequential,
    Ephemeral,
    EphemeralSequential,
}

impl CreateMode {
    /// Check if nodes of this mode belong to a session
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }

    /// Check if the name gets a counter suffix
    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }
}

/// Node metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Stat {
    /// Zxid of the batch that created the node
    pub czxid: Zxid,
    /// Zxid of the last data change
    pub mzxid: Zxid,
    /// Zxid of the last child add/remove
    pub pzxid: Zxid,
    /// Creation time, milliseconds since epoch
    pub ctime: i64,
    /// Last modification time, milliseconds since epoch
    pub mtime: i64,
    /// Data version
    pub version: i32,
    /// Child version
    pub cversion: i32,
    pub ephemeral_owner: SessionId,
    pub data_length: usize,
    pub num_children: usize,
}

impl Stat {
    /// Metadata of a freshly created node.
    pub fn created(zxid: Zxid, time: i64, data_length: usize, ephemeral_owner: SessionId) -> Self {
        Self {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ctime: time,
            mtime: time,
            version: 0,
            cversion: 0,
            ephemeral_owner,
            data_length,
            num_children: 0,
        }
    }

    /// True when `expected` is [`ANY_VERSION`] or equals the data version.
    pub fn version_matches(&self, expected: i32) -> bool {
        expected == ANY_VERSION || expected == self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_matches() {
        let mut stat = Stat::created(1, 0, 0, 0);
        assert!(stat.version_matches(ANY_VERSION));
        assert!(stat.version_matches(0));
        assert!(!stat.version_matches(1));
        stat.version = 1;
        assert!(stat.version_matches(1));
    }

    #[test]
    fn test_create_mode_flags() {
        assert!(CreateMode::EphemeralSequential.is_ephemeral());
        assert!(CreateMode::EphemeralSequential.is_sequential());
        assert!(!CreateMode::Persistent.is_ephemeral());
        assert!(!CreateMode::Ephemeral.is_sequential());
    }
}

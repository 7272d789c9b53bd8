use crate::core::Zxid;
use crate::transaction::EventType;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

/// Set of event kinds a registration is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EventMask(u8);

impl EventMask {
    pub const NONE: EventMask = EventMask(0);
    pub const CREATED: EventMask = EventMask(1);
    pub const DELETED: EventMask = EventMask(1 << 1);
    pub const DATA_CHANGED: EventMask = EventMask(1 << 2);
    pub const CHILDREN_CHANGED: EventMask = EventMask(1 << 3);
    pub const ALL: EventMask = EventMask(0b1111);

    /// Interest of an exists/get-data watch.
    pub const DATA: EventMask = EventMask(Self::CREATED.0 | Self::DELETED.0 | Self::DATA_CHANGED.0);
    /// Interest of a get-children watch.
    pub const CHILDREN: EventMask = EventMask(Self::DELETED.0 | Self::CHILDREN_CHANGED.0);

    /// Mask holding exactly `kind`
    pub fn of(kind: EventType) -> Self {
        match kind {
            EventType::NodeCreated => Self::CREATED,
            EventType::NodeDeleted => Self::DELETED,
            EventType::NodeDataChanged => Self::DATA_CHANGED,
            EventType::NodeChildrenChanged => Self::CHILDREN_CHANGED,
        }
    }

    /// Check if `kind` is part of the mask
    pub fn contains(&self, kind: EventType) -> bool {
        self.0 & Self::of(kind).0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        EventMask(self.0 | rhs.0)
    }
}

impl From<EventType> for EventMask {
    fn from(kind: EventType) -> Self {
        EventMask::of(kind)
    }
}

/// Identifier of a single one-shot registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WatchHandle(pub u64);

impl std::fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "watch_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedEvent {
    pub handle: WatchHandle,
    pub path: String,
    pub kind: EventType,
    /// Zxid of the batch that triggered the event
    pub zxid: Zxid,
}

/// Item on a session's delivery channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Event(WatchedEvent),
    /// Every notification caused by batches up to `zxid` precedes this marker
    Synced { zxid: Zxid },
}

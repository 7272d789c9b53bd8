// ============================================================================
// Change Events
// ============================================================================
//
// A committed batch produces an ordered change-set: one primary event per
// mutating operation, followed by the parent's child event for creates and
// deletes. Checks produce nothing.
//
// ============================================================================

use crate::core::path;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    NodeCreated,
    NodeDeleted,
    NodeDataChanged,
    NodeChildrenChanged,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::NodeCreated => write!(f, "NodeCreated"),
            EventType::NodeDeleted => write!(f, "NodeDeleted"),
            EventType::NodeDataChanged => write!(f, "NodeDataChanged"),
            EventType::NodeChildrenChanged => write!(f, "NodeChildrenChanged"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: String,
    pub kind: EventType,
}

impl ChangeEvent {
    /// Create an event for `path`
    pub fn new(path: impl Into<String>, kind: EventType) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Events for a node created at `node_path`.
    pub(crate) fn created(node_path: &str) -> Vec<ChangeEvent> {
        Self::with_parent(node_path, EventType::NodeCreated)
    }

    /// Events for a node deleted at `node_path`.
    pub(crate) fn deleted(node_path: &str) -> Vec<ChangeEvent> {
        Self::with_parent(node_path, EventType::NodeDeleted)
    }

    fn with_parent(node_path: &str, kind: EventType) -> Vec<ChangeEvent> {
        let mut events = vec![ChangeEvent::new(node_path, kind)];
        if let Some(parent) = path::parent(node_path) {
            events.push(ChangeEvent::new(parent, EventType::NodeChildrenChanged));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_includes_parent_children_event() {
        let events = ChangeEvent::created("/a/b");
        assert_eq!(
            events,
            vec![
                ChangeEvent::new("/a/b", EventType::NodeCreated),
                ChangeEvent::new("/a", EventType::NodeChildrenChanged),
            ]
        );
    }

    #[test]
    fn test_deleted_top_level_reports_root() {
        let events = ChangeEvent::deleted("/t");
        assert_eq!(events[0].kind, EventType::NodeDeleted);
        assert_eq!(events[1], ChangeEvent::new("/", EventType::NodeChildrenChanged));
    }
}

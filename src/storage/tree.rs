use super::Node;
use crate::core::{Zxid, path};
use im::OrdMap;
use serde::{Deserialize, Serialize};

/// In-memory namespace of nodes keyed by absolute path.
///
/// Backed by a persistent map: cloning a tree is O(1) and shares structure,
/// so the writer prepares the next version on a clone while readers keep
/// the previous one.
///
/// Mutation primitives assume their preconditions were already proven by
/// the transaction validator. They never fail; an absent target is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceTree {
    nodes: OrdMap<String, Node>,
    last_zxid: Zxid,
}

impl NamespaceTree {
    /// Tree holding only the root node
    pub fn new() -> Self {
        let mut nodes = OrdMap::new();
        nodes.insert(path::ROOT.to_string(), Node::root());
        Self { nodes, last_zxid: 0 }
    }

    /// Get the node at `path`
    pub fn lookup(&self, path: &str) -> Option<&Node> {
        self.nodes.get(path)
    }

    /// Check if a node exists at `path`
    pub fn exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    /// Child names in sorted order, or `None` when the node is absent.
    pub fn children(&self, path: &str) -> Option<Vec<String>> {
        self.lookup(path)
            .map(|node| node.children().cloned().collect())
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Zxid of the last committed batch reflected in this tree.
    pub fn last_zxid(&self) -> Zxid {
        self.last_zxid
    }

    pub(crate) fn set_last_zxid(&mut self, zxid: Zxid) {
        self.last_zxid = zxid;
    }

    /// Add `node` at `path` and link it into its parent.
    pub fn insert(&mut self, node_path: &str, node: Node, zxid: Zxid) {
        if let Some(parent) = path::parent(node_path)
            && let Some(parent_node) = self.nodes.get_mut(parent)
        {
            parent_node.link_child(path::name(node_path), zxid);
        }
        self.nodes.insert(node_path.to_string(), node);
    }

    /// Remove the node at `path` and unlink it from its parent.
    pub fn remove(&mut self, node_path: &str, zxid: Zxid) {
        if self.nodes.remove(node_path).is_none() {
            return;
        }
        if let Some(parent) = path::parent(node_path)
            && let Some(parent_node) = self.nodes.get_mut(parent)
        {
            parent_node.unlink_child(path::name(node_path), zxid);
        }
    }

    /// Replace the data of an existing node. Missing paths are ignored.
    pub fn set_data(&mut self, node_path: &str, data: Vec<u8>, zxid: Zxid, time: i64) {
        if let Some(node) = self.nodes.get_mut(node_path) {
            node.update_data(data, zxid, time);
        }
    }

    /// All paths in lexical order.
    pub fn paths(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }
}

impl Default for NamespaceTree {
    fn default() -> Self {
        Self::new()
    }
}

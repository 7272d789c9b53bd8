use crate::core::{Stat, Zxid, path};
use crate::storage::{NamespaceTree, Node};
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Staged {
    Live(Node),
    Deleted,
}

/// Working view of a batch in flight: staged node states layered over a
/// borrowed tree. Lookups check the staged entries first. The tree itself
/// is never touched; dropping the overlay discards the batch.
#[derive(Debug)]
pub struct Overlay<'t> {
    tree: &'t NamespaceTree,
    staged: HashMap<String, Staged>,
}

impl<'t> Overlay<'t> {
    /// Empty overlay over `tree`
    pub fn new(tree: &'t NamespaceTree) -> Self {
        Self {
            tree,
            staged: HashMap::new(),
        }
    }

    /// Node at `path` as the batch currently sees it.
    pub fn resolve(&self, node_path: &str) -> Option<&Node> {
        match self.staged.get(node_path) {
            Some(Staged::Live(node)) => Some(node),
            Some(Staged::Deleted) => None,
            None => self.tree.lookup(node_path),
        }
    }

    /// Check if `node_path` exists once staged changes are applied
    pub fn is_live(&self, node_path: &str) -> bool {
        self.resolve(node_path).is_some()
    }

    /// Number of paths with staged state.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    fn staged_mut(&mut self, node_path: &str) -> Option<&mut Node> {
        if !self.staged.contains_key(node_path) {
            let node = self.tree.lookup(node_path)?.clone();
            self.staged.insert(node_path.to_string(), Staged::Live(node));
        }
        match self.staged.get_mut(node_path) {
            Some(Staged::Live(node)) => Some(node),
            _ => None,
        }
    }

    /// Stage a new node and link it into its staged parent
    pub fn stage_create(&mut self, node_path: &str, node: Node, zxid: Zxid) {
        if let Some(parent) = path::parent(node_path)
            && let Some(parent_node) = self.staged_mut(parent)
        {
            parent_node.link_child(path::name(node_path), zxid);
        }
        self.staged.insert(node_path.to_string(), Staged::Live(node));
    }

    /// Stage a removal and unlink the node from its staged parent
    pub fn stage_delete(&mut self, node_path: &str, zxid: Zxid) {
        self.staged.insert(node_path.to_string(), Staged::Deleted);
        if let Some(parent) = path::parent(node_path)
            && let Some(parent_node) = self.staged_mut(parent)
        {
            parent_node.unlink_child(path::name(node_path), zxid);
        }
    }

    /// Stage new data and return the resulting metadata.
    pub fn stage_set_data(&mut self, node_path: &str, data: Vec<u8>, zxid: Zxid, time: i64) -> Option<Stat> {
        let node = self.staged_mut(node_path)?;
        node.update_data(data, zxid, time);
        Some(*node.stat())
    }
}

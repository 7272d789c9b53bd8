// ============================================================================
// Transaction Committer
// ============================================================================
//
// Folds a validated batch into the next tree version in one pass. The
// caller's tree is only read; the returned tree is published as a whole,
// so readers never see a half-applied batch.
//
// ============================================================================

use super::change::ChangeEvent;
use super::result::OpResult;
use super::validator::{BatchContext, Mutation, ValidatedBatch};
use crate::storage::NamespaceTree;

#[derive(Debug)]
pub struct Commit {
    pub ctx: BatchContext,
    pub tree: NamespaceTree,
    /// Ordered change-set of the batch
    pub events: Vec<ChangeEvent>,
    pub results: Vec<OpResult>,
}

/// Fold a validated batch into a clone of `current`.
pub fn commit(current: &NamespaceTree, batch: ValidatedBatch) -> Commit {
    let ValidatedBatch {
        ctx,
        mutations,
        results,
    } = batch;
    let mut tree = current.clone();
    let mut events = Vec::with_capacity(mutations.len() * 2);

    for mutation in mutations {
        match mutation {
            Mutation::Create { path, node } => {
                tree.insert(&path, node, ctx.zxid);
                events.extend(ChangeEvent::created(&path));
            }
            Mutation::Delete { path } => {
                tree.remove(&path, ctx.zxid);
                events.extend(ChangeEvent::deleted(&path));
            }
            Mutation::SetData { path, data } => {
                tree.set_data(&path, data, ctx.zxid, ctx.time);
                events.push(ChangeEvent::new(path, super::EventType::NodeDataChanged));
            }
        }
    }
    tree.set_last_zxid(ctx.zxid);

    Commit {
        ctx,
        tree,
        events,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::validator::validate;
    use crate::transaction::{EventType, Op};

    fn ctx(zxid: u64) -> BatchContext {
        BatchContext {
            zxid,
            time: 500,
            session: 7,
        }
    }

    fn run(tree: &NamespaceTree, ops: &[Op], zxid: u64) -> Commit {
        let validated = validate(tree, ops, ctx(zxid)).expect("valid batch");
        commit(tree, validated)
    }

    #[test]
    fn test_commit_produces_new_version() {
        let tree = NamespaceTree::new();
        let done = run(&tree, &[Op::create("/a", "v"), Op::set_data("/a", "w", 0)], 1);

        assert!(!tree.exists("/a"));
        let node = done.tree.lookup("/a").unwrap();
        assert_eq!(node.data(), b"w");
        assert_eq!(node.stat().version, 1);
        assert_eq!(done.tree.last_zxid(), 1);
    }

    #[test]
    fn test_change_set_order() {
        let tree = NamespaceTree::new();
        let done = run(
            &tree,
            &[Op::create("/t", ""), Op::check("/t", 0), Op::set_data("/t", "x", -1), Op::delete("/t", 1)],
            1,
        );
        let kinds: Vec<_> = done.events.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("/t", EventType::NodeCreated),
                ("/", EventType::NodeChildrenChanged),
                ("/t", EventType::NodeDataChanged),
                ("/t", EventType::NodeDeleted),
                ("/", EventType::NodeChildrenChanged),
            ]
        );
    }

    #[test]
    fn test_committed_tree_matches_staged_results() {
        let tree = NamespaceTree::new();
        let done = run(
            &tree,
            &[Op::create("/p", ""), Op::create("/p/c", "1"), Op::set_data("/p/c", "22", 0)],
            3,
        );
        match &done.results[2] {
            OpResult::SetData { stat } => assert_eq!(stat, done.tree.lookup("/p/c").unwrap().stat()),
            other => panic!("unexpected result {:?}", other),
        }
        let parent = done.tree.lookup("/p").unwrap();
        assert_eq!(parent.stat().cversion, 1);
        assert_eq!(parent.stat().pzxid, 3);
    }
}

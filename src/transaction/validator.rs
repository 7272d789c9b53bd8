// ============================================================================
// Transaction Validator
// ============================================================================
//
// Proves every precondition of a batch against an overlay that already
// reflects the earlier operations of the same batch. The first failure
// stops evaluation; the overlay is dropped with it.
//
// ============================================================================

use super::overlay::Overlay;
use super::result::{OpResult, ValidationFailure};
use super::Op;
use crate::core::{CreateMode, ErrorCode, SessionId, Zxid, path};
use crate::storage::{NamespaceTree, Node};

/// Commit coordinates fixed before validation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchContext {
    /// Zxid the batch receives if it commits
    pub zxid: Zxid,
    /// Wall-clock time stamped into ctime/mtime, milliseconds since epoch
    pub time: i64,
    pub session: SessionId,
}

/// Tree mutation proven valid by the validator, in batch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { path: String, node: Node },
    Delete { path: String },
    SetData { path: String, data: Vec<u8> },
}

#[derive(Debug)]
pub struct ValidatedBatch {
    pub ctx: BatchContext,
    pub mutations: Vec<Mutation>,
    pub results: Vec<OpResult>,
}

impl ValidatedBatch {
    /// Batches made only of checks leave the tree untouched.
    pub fn is_read_only(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Check every operation of a batch in order against `tree` plus the
/// effects of the operations before it. Stops at the first failure.
pub fn validate(
    tree: &NamespaceTree,
    ops: &[Op],
    ctx: BatchContext,
) -> Result<ValidatedBatch, ValidationFailure> {
    let mut overlay = Overlay::new(tree);
    let mut mutations = Vec::with_capacity(ops.len());
    let mut results = Vec::with_capacity(ops.len());

    for (index, op) in ops.iter().enumerate() {
        match validate_op(&mut overlay, op, &ctx) {
            Ok((mutation, result)) => {
                mutations.extend(mutation);
                results.push(result);
            }
            Err(code) => {
                return Err(ValidationFailure {
                    index,
                    path: op.path().to_string(),
                    code,
                });
            }
        }
    }

    Ok(ValidatedBatch {
        ctx,
        mutations,
        results,
    })
}

type Staged = (Option<Mutation>, OpResult);

fn validate_op(overlay: &mut Overlay<'_>, op: &Op, ctx: &BatchContext) -> Result<Staged, ErrorCode> {
    match op {
        Op::Create { path, data, mode } => validate_create(overlay, path, data, *mode, ctx),
        Op::Delete { path, version } => {
            path::validate_op(path)?;
            if path == path::ROOT {
                return Err(ErrorCode::BadArguments);
            }
            let node = overlay.resolve(path).ok_or(ErrorCode::NoNode)?;
            if node.has_children() {
                return Err(ErrorCode::NotEmpty);
            }
            if !node.stat().version_matches(*version) {
                return Err(ErrorCode::BadVersion);
            }
            overlay.stage_delete(path, ctx.zxid);
            Ok((Some(Mutation::Delete { path: path.clone() }), OpResult::Delete))
        }
        Op::SetData { path, data, version } => {
            path::validate_op(path)?;
            let node = overlay.resolve(path).ok_or(ErrorCode::NoNode)?;
            if !node.stat().version_matches(*version) {
                return Err(ErrorCode::BadVersion);
            }
            let stat = overlay
                .stage_set_data(path, data.clone(), ctx.zxid, ctx.time)
                .ok_or(ErrorCode::NoNode)?;
            let mutation = Mutation::SetData {
                path: path.clone(),
                data: data.clone(),
            };
            Ok((Some(mutation), OpResult::SetData { stat }))
        }
        Op::Check { path, version } => {
            path::validate_op(path)?;
            let node = overlay.resolve(path).ok_or(ErrorCode::NoNode)?;
            if !node.stat().version_matches(*version) {
                return Err(ErrorCode::BadVersion);
            }
            Ok((None, OpResult::Check))
        }
    }
}

fn validate_create(
    overlay: &mut Overlay<'_>,
    requested: &str,
    data: &[u8],
    mode: CreateMode,
    ctx: &BatchContext,
) -> Result<Staged, ErrorCode> {
    let node_path = if mode.is_sequential() {
        // the counter suffix completes the name, so "/queue/" is acceptable here
        path::validate_op(&format!("{}1", requested))?;
        let parent = path::parent(requested).ok_or(ErrorCode::BadArguments)?;
        let counter = overlay.resolve(parent).ok_or(ErrorCode::NoNode)?.stat().cversion;
        path::sequential(requested, counter)
    } else {
        path::validate_op(requested)?;
        requested.to_string()
    };

    if overlay.is_live(&node_path) {
        return Err(ErrorCode::NodeExists);
    }
    let parent = path::parent(&node_path).ok_or(ErrorCode::BadArguments)?;
    if !overlay.is_live(parent) {
        return Err(ErrorCode::NoNode);
    }

    let owner = if mode.is_ephemeral() { ctx.session } else { 0 };
    let node = Node::new(data.to_vec(), ctx.zxid, ctx.time, owner);
    let stat = *node.stat();
    overlay.stage_create(&node_path, node.clone(), ctx.zxid);

    let mutation = Mutation::Create {
        path: node_path.clone(),
        node,
    };
    Ok((Some(mutation), OpResult::Create { path: node_path, stat }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ANY_VERSION;

    fn ctx() -> BatchContext {
        BatchContext {
            zxid: 1,
            time: 1_000,
            session: 42,
        }
    }

    fn failure(tree: &NamespaceTree, ops: &[Op]) -> ValidationFailure {
        validate(tree, ops, ctx()).expect_err("batch should fail")
    }

    #[test]
    fn test_nested_creates_see_earlier_ops() {
        let tree = NamespaceTree::new();
        let ops = vec![Op::create("/a", ""), Op::create("/a/b", ""), Op::create("/a/b/c", "")];
        let validated = validate(&tree, &ops, ctx()).unwrap();
        assert_eq!(validated.mutations.len(), 3);
        assert_eq!(validated.results.len(), 3);
        // nothing touched the real tree
        assert!(!tree.exists("/a"));
    }

    #[test]
    fn test_create_existing_and_orphan() {
        let tree = NamespaceTree::new();
        let f = failure(&tree, &[Op::create("/a", ""), Op::create("/a", "")]);
        assert_eq!((f.index, f.code), (1, ErrorCode::NodeExists));

        let f = failure(&tree, &[Op::create("/x/y", "")]);
        assert_eq!((f.index, f.code, f.path.as_str()), (0, ErrorCode::NoNode, "/x/y"));

        let f = failure(&tree, &[Op::create("/", "")]);
        assert_eq!(f.code, ErrorCode::NodeExists);
    }

    #[test]
    fn test_delete_rules() {
        let tree = NamespaceTree::new();

        let f = failure(&tree, &[Op::delete("/missing", ANY_VERSION)]);
        assert_eq!(f.code, ErrorCode::NoNode);

        let f = failure(&tree, &[Op::create("/a", ""), Op::create("/a/b", ""), Op::delete("/a", 0)]);
        assert_eq!((f.index, f.code), (2, ErrorCode::NotEmpty));

        let f = failure(&tree, &[Op::create("/m", ""), Op::delete("/m", 1)]);
        assert_eq!((f.index, f.code), (1, ErrorCode::BadVersion));

        let f = failure(&tree, &[Op::delete("/", ANY_VERSION)]);
        assert_eq!(f.code, ErrorCode::BadArguments);

        let f = failure(&tree, &[Op::create("/a", ""), Op::delete("/a", 0), Op::delete("/a", 0)]);
        assert_eq!((f.index, f.code), (2, ErrorCode::NoNode));
    }

    #[test]
    fn test_not_empty_checked_before_version() {
        let tree = NamespaceTree::new();
        let f = failure(&tree, &[Op::create("/a", ""), Op::create("/a/b", ""), Op::delete("/a", 7)]);
        assert_eq!(f.code, ErrorCode::NotEmpty);
    }

    #[test]
    fn test_set_data_versions_follow_batch_order() {
        let tree = NamespaceTree::new();
        let f = failure(
            &tree,
            &[Op::create("/m", ""), Op::set_data("/m", "X", 0), Op::set_data("/m", "Y", 0)],
        );
        assert_eq!((f.index, f.code), (2, ErrorCode::BadVersion));

        let ok = validate(
            &tree,
            &[Op::create("/m", ""), Op::set_data("/m", "X", 0), Op::set_data("/m", "Y", 1)],
            ctx(),
        )
        .unwrap();
        match &ok.results[2] {
            OpResult::SetData { stat } => assert_eq!(stat.version, 2),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_check_stages_nothing() {
        let tree = NamespaceTree::new();
        let validated = validate(&tree, &[Op::check("/", 0)], ctx()).unwrap();
        assert!(validated.is_read_only());
        assert_eq!(validated.results, vec![OpResult::Check]);

        let f = failure(&tree, &[Op::check("/", 3)]);
        assert_eq!(f.code, ErrorCode::BadVersion);
    }

    #[test]
    fn test_invalid_path_is_bad_arguments() {
        let tree = NamespaceTree::new();
        let f = failure(&tree, &[Op::create("/ok", ""), Op::set_data("no-slash", "", ANY_VERSION)]);
        assert_eq!((f.index, f.code), (1, ErrorCode::BadArguments));
    }

    #[test]
    fn test_sequential_names_use_parent_cversion() {
        let tree = NamespaceTree::new();
        let ops = vec![
            Op::create("/q", ""),
            Op::create_with_mode("/q/n-", "", CreateMode::PersistentSequential),
            Op::create_with_mode("/q/n-", "", CreateMode::EphemeralSequential),
        ];
        let validated = validate(&tree, &ops, ctx()).unwrap();
        let paths: Vec<_> = validated
            .results
            .iter()
            .map(|r| match r {
                OpResult::Create { path, .. } => path.clone(),
                other => panic!("unexpected result {:?}", other),
            })
            .collect();
        assert_eq!(paths, vec!["/q", "/q/n-0000000000", "/q/n-0000000001"]);

        match &validated.results[2] {
            OpResult::Create { stat, .. } => assert_eq!(stat.ephemeral_owner, 42),
            other => panic!("unexpected result {:?}", other),
        }
    }
}

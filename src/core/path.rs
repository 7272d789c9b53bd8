// ============================================================================
// Path Utilities
// ============================================================================
//
// Paths are absolute and slash-delimited. The root is exactly "/".
//
// ============================================================================

use super::{CoordError, ErrorCode, Result};

pub const ROOT: &str = "/";

/// Check that `path` is a well-formed absolute node path.
pub fn validate(path: &str) -> Result<()> {
    let bad = |reason: &str| CoordError::InvalidRequest(format!("invalid path '{}': {}", path, reason));

    if path.is_empty() {
        return Err(bad("empty"));
    }
    if !path.starts_with('/') {
        return Err(bad("must start with '/'"));
    }
    if path == ROOT {
        return Ok(());
    }
    if path.ends_with('/') {
        return Err(bad("must not end with '/'"));
    }
    if path.contains('\0') {
        return Err(bad("contains NUL"));
    }
    for segment in path[1..].split('/') {
        match segment {
            "" => return Err(bad("empty segment")),
            "." | ".." => return Err(bad("relative segment")),
            _ => {}
        }
    }
    Ok(())
}

/// Like [`validate`], but reported as the per-operation `BadArguments` code.
pub fn validate_op(path: &str) -> std::result::Result<(), ErrorCode> {
    validate(path).map_err(|_| ErrorCode::BadArguments)
}

/// Parent path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Last segment of the path. Empty for the root.
pub fn name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Path of `child` under `parent`
pub fn join(parent: &str, child: &str) -> String {
    if parent == ROOT {
        format!("/{}", child)
    } else {
        format!("{}/{}", parent, child)
    }
}

/// Sequential node names carry the parent's child version as a ten digit suffix.
pub fn sequential(prefix: &str, counter: i32) -> String {
    format!("{}{:010}", prefix, counter)
}

//! Path string handling.
//!
//! Paths are `/`-separated, absolute and normalized: one leading `/`, no
//! empty segments, no trailing `/`. The root is `/`.

use crate::error::{PathError, Result};

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Normalize `path` into canonical absolute form.
pub fn normalize(path: &str) -> Result<String> {
    let invalid = |reason| PathError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains('\0') {
        return Err(invalid("contains NUL"));
    }

    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split(SEPARATOR).filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(invalid("relative segments are not allowed"));
        }
        out.push(SEPARATOR);
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push(SEPARATOR);
    }
    Ok(out)
}

/// Segments of a normalized path; empty for the root.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Append `child` (one or more segments) to `base`.
pub fn join(base: &str, child: &str) -> Result<String> {
    normalize(&format!("{base}{SEPARATOR}{child}"))
}

/// Parent of a normalized path. The root is its own parent.
pub fn parent(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) | None => ROOT,
        Some(idx) => &path[..idx],
    }
}

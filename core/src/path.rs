use crate::{Error, Result};

const MAX_PATH_BYTES: usize = 4096;

/// Splits a slash-separated resource path into its segments.
///
/// Leading, trailing and repeated slashes as well as `.` segments are ignored, so `""`, `"/"`
/// and `"./"` all name the root. `..` segments are rejected instead of being resolved.
pub fn split_resource_path(path: &str) -> Result<Vec<&str>> {
    if path.len() > MAX_PATH_BYTES {
        return Err(Error::InvalidPath(format!(
            "path is too large ({} bytes; max {} bytes)",
            path.len(),
            MAX_PATH_BYTES
        )));
    }
    if path.contains('\0') {
        return Err(Error::InvalidPath("NUL bytes are not allowed".to_string()));
    }
    if path.chars().any(|ch| ch.is_control()) {
        return Err(Error::InvalidPath(
            "path must not contain control characters".to_string(),
        ));
    }

    let mut out = Vec::new();
    for seg in path.split('/') {
        if seg.is_empty() || seg == "." {
            continue;
        }
        if seg == ".." {
            return Err(Error::InvalidPath(
                ".. segments are not allowed".to_string(),
            ));
        }
        out.push(seg);
    }
    Ok(out)
}

/// Appends one segment to an absolute resource path.
pub fn join_resource_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{name}")
}

/// Whether `name` can stand as a single path segment.
pub fn is_addressable_segment(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.chars().any(|ch| ch.is_control())
}

use std::fs;
use std::path::{Path, PathBuf};

use dbfs_core::path::is_addressable_segment;

use super::{Collection, DatabaseCollection, DatabaseRef, Node, Resource};

/// A host directory reached through the escape hatch.
///
/// Lookups go straight to the filesystem; the directory is never enumerated, so its
/// listing is always empty.
#[derive(Debug, Clone)]
pub struct PathCollection {
    pub(super) node: Node,
    dir: PathBuf,
}

impl PathCollection {
    pub fn host_path(&self) -> &Path {
        &self.dir
    }

    pub fn list_children(&self) -> Vec<String> {
        Vec::new()
    }

    pub fn get_child(&self, name: &str) -> Option<Resource> {
        lookup(&self.node, &self.dir, name)
    }

    pub fn children(&self) -> Vec<Resource> {
        Vec::new()
    }
}

/// Classifies `dir/name` on the host: directories continue the walk, regular files are
/// opened as databases, anything else (including symlinks unless followed) is absent.
pub(super) fn lookup(parent: &Node, dir: &Path, name: &str) -> Option<Resource> {
    if !is_addressable_segment(name) {
        return None;
    }
    let host_path = dir.join(name);
    let follow = parent.ctx.escape_hatch.follow_symlinks;
    let meta = if follow {
        fs::metadata(&host_path)
    } else {
        fs::symlink_metadata(&host_path)
    };
    let meta = match meta {
        Ok(meta) => meta,
        Err(err) => {
            tracing::debug!(path = %host_path.display(), %err, "host path lookup failed");
            return None;
        }
    };

    let node = parent.child(name);
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        tracing::warn!(path = %host_path.display(), "refusing to follow symlink");
        None
    } else if file_type.is_dir() {
        Some(
            Collection::Path(PathCollection {
                node,
                dir: host_path,
            })
            .into(),
        )
    } else if file_type.is_file() {
        let database = DatabaseRef::with_name(name, host_path);
        Some(Collection::Database(DatabaseCollection::new(node, database)).into())
    } else {
        None
    }
}

use std::sync::Arc;

use dbfs_core::config::FsConfig;
use dbfs_core::format::ExportFormat;
use dbfs_core::path::split_resource_path;
use dbfs_core::{Error, Result};

use crate::cancel::CancelToken;
use crate::tree::{Collection, DatabaseRef, Resource, TreeContext};

/// Entry point for consumers of the tree: holds the validated configuration and resolves
/// paths. Cloning is cheap and clones share the same immutable state.
#[derive(Debug, Clone)]
pub struct Provider {
    ctx: Arc<TreeContext>,
    cancel: CancelToken,
}

impl Provider {
    /// Fails with [`Error::Config`] when two databases share a basename or the format
    /// list is empty or repeated. Does not touch the filesystem.
    pub fn new(config: &FsConfig) -> Result<Self> {
        config.validate()?;

        let databases = config
            .databases
            .iter()
            .map(|path| DatabaseRef::new(path.clone()))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            databases = databases.len(),
            formats = ?config.formats,
            escape_hatch = config.escape_hatch.enabled,
            "provider configured"
        );

        Ok(Self {
            ctx: Arc::new(TreeContext {
                databases,
                formats: config.formats.clone(),
                content_length: config.content_length,
                escape_hatch: config.escape_hatch.clone(),
            }),
            cancel: CancelToken::new(),
        })
    }

    pub fn databases(&self) -> &[DatabaseRef] {
        &self.ctx.databases
    }

    pub fn formats(&self) -> &[ExportFormat] {
        &self.ctx.formats
    }

    /// A provider sharing this one's state whose table work is tied to `cancel`.
    pub fn with_cancel(&self, cancel: CancelToken) -> Self {
        Self {
            ctx: self.ctx.clone(),
            cancel,
        }
    }

    pub fn root(&self) -> Collection {
        Collection::root(self.ctx.clone(), self.cancel.clone())
    }

    /// Walks `path` from the root one segment at a time. The empty path is the root.
    pub fn resolve(&self, path: &str) -> Result<Resource> {
        let segments = split_resource_path(path)?;
        let mut node = Resource::Collection(self.root());
        for segment in segments {
            node = node
                .get_child(segment)?
                .ok_or_else(|| Error::NotFound(format!("no such resource: {path}")))?;
        }
        tracing::debug!(path, resolved = node.path(), "resolved resource");
        Ok(node)
    }
}

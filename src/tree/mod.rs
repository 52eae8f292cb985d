//! The virtual resource tree: root → database collections → table artifacts, plus the
//! optional host-path subtree.
//!
//! Nodes are cheap values built on demand during resolution. Each one carries the shared
//! [`TreeContext`] and its own resource path; nothing below the context is cached, so every
//! listing reflects the live schema.

mod artifact;
mod database;
mod host;
mod root;

use std::sync::Arc;

use dbfs_core::Result;
use dbfs_core::config::{ContentLength, EscapeHatch};
use dbfs_core::format::ExportFormat;
use dbfs_core::path::join_resource_path;

use crate::cancel::CancelToken;
use crate::table::TableHandle;

pub use artifact::TableArtifact;
pub use database::{DatabaseCollection, DatabaseRef};
pub use host::PathCollection;
pub use root::RootCollection;

/// Immutable state shared by every node of one provider.
#[derive(Debug)]
pub(crate) struct TreeContext {
    pub(crate) databases: Vec<DatabaseRef>,
    pub(crate) formats: Vec<ExportFormat>,
    pub(crate) content_length: ContentLength,
    pub(crate) escape_hatch: EscapeHatch,
}

#[derive(Debug, Clone)]
struct Node {
    ctx: Arc<TreeContext>,
    path: String,
    cancel: CancelToken,
}

impl Node {
    fn root(ctx: Arc<TreeContext>, cancel: CancelToken) -> Self {
        Self {
            ctx,
            path: "/".to_string(),
            cancel,
        }
    }

    fn child(&self, name: &str) -> Self {
        Self {
            ctx: self.ctx.clone(),
            path: join_resource_path(&self.path, name),
            cancel: self.cancel.clone(),
        }
    }

    fn handle(&self, database: &DatabaseRef) -> TableHandle {
        database.handle().with_cancel(self.cancel.clone())
    }

    fn name(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.path,
        }
    }
}

/// Directory-like node.
#[derive(Debug, Clone)]
pub enum Collection {
    Root(RootCollection),
    Database(DatabaseCollection),
    Path(PathCollection),
}

impl Collection {
    pub(crate) fn root(ctx: Arc<TreeContext>, cancel: CancelToken) -> Self {
        Collection::Root(RootCollection::new(Node::root(ctx, cancel)))
    }

    /// Absolute resource path, `/` for the root.
    pub fn path(&self) -> &str {
        &self.node().path
    }

    /// Last path segment, empty for the root.
    pub fn name(&self) -> &str {
        self.node().name()
    }

    pub fn list_children(&self) -> Result<Vec<String>> {
        match self {
            Collection::Root(root) => Ok(root.list_children()),
            Collection::Database(db) => db.list_children(),
            Collection::Path(dir) => Ok(dir.list_children()),
        }
    }

    pub fn get_child(&self, name: &str) -> Result<Option<Resource>> {
        match self {
            Collection::Root(root) => Ok(root.get_child(name)),
            Collection::Database(db) => db.get_child(name),
            Collection::Path(dir) => Ok(dir.get_child(name)),
        }
    }

    /// Every child node, built from a single listing.
    pub fn children(&self) -> Result<Vec<Resource>> {
        match self {
            Collection::Root(root) => Ok(root.children()),
            Collection::Database(db) => db.children(),
            Collection::Path(dir) => Ok(dir.children()),
        }
    }

    fn node(&self) -> &Node {
        match self {
            Collection::Root(root) => &root.node,
            Collection::Database(db) => &db.node,
            Collection::Path(dir) => &dir.node,
        }
    }
}

/// What a path resolves to: something listable or something readable.
#[derive(Debug, Clone)]
pub enum Resource {
    Collection(Collection),
    Artifact(TableArtifact),
}

impl Resource {
    pub fn path(&self) -> &str {
        match self {
            Resource::Collection(collection) => collection.path(),
            Resource::Artifact(artifact) => artifact.path(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Resource::Collection(collection) => collection.name(),
            Resource::Artifact(artifact) => artifact.name(),
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Resource::Collection(_))
    }

    /// Artifacts have no children.
    pub fn get_child(&self, name: &str) -> Result<Option<Resource>> {
        match self {
            Resource::Collection(collection) => collection.get_child(name),
            Resource::Artifact(_) => Ok(None),
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Resource::Collection(collection) => Some(collection),
            Resource::Artifact(_) => None,
        }
    }

    pub fn as_artifact(&self) -> Option<&TableArtifact> {
        match self {
            Resource::Collection(_) => None,
            Resource::Artifact(artifact) => Some(artifact),
        }
    }
}

impl From<Collection> for Resource {
    fn from(collection: Collection) -> Self {
        Resource::Collection(collection)
    }
}

impl From<TableArtifact> for Resource {
    fn from(artifact: TableArtifact) -> Self {
        Resource::Artifact(artifact)
    }
}

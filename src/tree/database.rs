use std::path::{Path, PathBuf};

use dbfs_core::Result;
use dbfs_core::config::database_name;
use dbfs_core::path::is_addressable_segment;

use super::{Node, Resource, TableArtifact};
use crate::table::TableHandle;

/// A database file and the name it is served under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRef {
    name: String,
    path: PathBuf,
}

impl DatabaseRef {
    /// Names the database after the basename of `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = database_name(&path)?;
        Ok(Self { name, path })
    }

    pub(super) fn with_name(name: &str, path: PathBuf) -> Self {
        Self {
            name: name.to_string(),
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> TableHandle {
        TableHandle::new(&self.path)
    }
}

/// One database file: a `table + suffix` child per table and enabled format.
#[derive(Debug, Clone)]
pub struct DatabaseCollection {
    pub(super) node: Node,
    database: DatabaseRef,
}

impl DatabaseCollection {
    pub(super) fn new(node: Node, database: DatabaseRef) -> Self {
        Self { node, database }
    }

    pub fn database(&self) -> &DatabaseRef {
        &self.database
    }

    /// Current tables, re-read from the catalog on every call.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut tables = self.node.handle(&self.database).list_table_names()?;
        tables.retain(|table| {
            let ok = is_addressable_segment(table);
            if !ok {
                tracing::warn!(
                    db = %self.database.path.display(),
                    table = %table.escape_debug(),
                    "table name cannot be used as a path segment; skipping"
                );
            }
            ok
        });
        Ok(tables)
    }

    /// Tables outer, formats inner.
    pub fn list_children(&self) -> Result<Vec<String>> {
        let tables = self.table_names()?;
        let formats = &self.node.ctx.formats;
        let mut names = Vec::with_capacity(tables.len() * formats.len());
        for table in &tables {
            for format in formats {
                names.push(format!("{table}{}", format.suffix()));
            }
        }
        Ok(names)
    }

    pub fn get_child(&self, name: &str) -> Result<Option<Resource>> {
        let tables = self.table_names()?;
        for format in &self.node.ctx.formats {
            let Some(table) = name.strip_suffix(format.suffix()) else {
                continue;
            };
            if tables.iter().any(|candidate| candidate == table) {
                let artifact = TableArtifact::new(
                    self.node.child(name),
                    self.database.clone(),
                    table.to_string(),
                    *format,
                );
                return Ok(Some(artifact.into()));
            }
        }
        Ok(None)
    }

    pub fn children(&self) -> Result<Vec<Resource>> {
        let tables = self.table_names()?;
        let mut out = Vec::new();
        for table in tables {
            for format in &self.node.ctx.formats {
                let name = format!("{table}{}", format.suffix());
                let artifact = TableArtifact::new(
                    self.node.child(&name),
                    self.database.clone(),
                    table.clone(),
                    *format,
                );
                out.push(artifact.into());
            }
        }
        Ok(out)
    }
}

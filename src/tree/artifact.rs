use std::io::{self, Write};

use dbfs_core::Result;
use dbfs_core::config::ContentLength;
use dbfs_core::format::ExportFormat;

use super::{DatabaseRef, Node};
use crate::cancel::CancelToken;
use crate::table::TableDescriptor;

/// One table in one export format. Every read runs the query again.
#[derive(Debug, Clone)]
pub struct TableArtifact {
    node: Node,
    database: DatabaseRef,
    table: String,
    format: ExportFormat,
}

impl TableArtifact {
    pub(super) fn new(
        node: Node,
        database: DatabaseRef,
        table: String,
        format: ExportFormat,
    ) -> Self {
        Self {
            node,
            database,
            table,
            format,
        }
    }

    /// The same artifact with its table work tied to `cancel`.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.node.cancel = cancel;
        self
    }

    pub fn path(&self) -> &str {
        &self.node.path
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            database_name: self.database.name().to_string(),
            table_name: self.table.clone(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }

    /// Encodes the whole table into memory.
    pub fn read(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Streams the encoded table into `out`; returns the number of bytes written.
    pub fn write_to<W: Write>(&self, out: W) -> Result<u64> {
        self.node
            .handle(&self.database)
            .export(&self.table, self.format, out)
    }

    /// `None` unless lengths are configured to be computed, which costs a full encode.
    pub fn known_length(&self) -> Result<Option<u64>> {
        match self.node.ctx.content_length {
            ContentLength::Unknown => Ok(None),
            ContentLength::Computed => self.write_to(io::sink()).map(Some),
        }
    }
}

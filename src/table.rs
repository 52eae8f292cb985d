//! Per-operation access to one SQLite database file.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags, Row, Statement};

use dbfs_core::format::ExportFormat;
use dbfs_core::{Error, Result};

use crate::cancel::CancelToken;
use crate::encode::{CountingWriter, Encoder};

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    fn from_sql(value: ValueRef<'_>, column: &str) -> Result<Self> {
        Ok(match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) => Value::Integer(n),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => Value::Text(s.to_string()),
                Err(_) => {
                    return Err(Error::Encoding(format!(
                        "column {column:?} holds TEXT that is not valid UTF-8"
                    )));
                }
            },
            ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
        })
    }
}

/// Rows of one table, in the order SQLite returned them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TabularResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableDescriptor {
    pub database_name: String,
    pub table_name: String,
}

impl fmt::Display for TableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.database_name, self.table_name)
    }
}

/// Opens a fresh read-only connection for every operation; nothing is held between calls.
#[derive(Debug, Clone)]
pub struct TableHandle {
    path: PathBuf,
    cancel: Option<CancelToken>,
}

impl TableHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cancel: None,
        }
    }

    /// Ties every connection this handle opens to `cancel`.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Table names from the catalog, in catalog order.
    pub fn list_table_names(&self) -> Result<Vec<String>> {
        let conn = self.open()?;
        self.catalog(&conn)
    }

    /// Runs `SELECT *` against `table`, which must be a current table of the database.
    pub fn query_table(&self, table: &str) -> Result<TabularResult> {
        let conn = self.open()?;
        let mut stmt = self.prepare_select_all(&conn, table)?;
        let columns = column_names(&stmt);

        let mut rows = stmt.query([]).map_err(|err| self.query_err(table, err))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|err| self.query_err(table, err))? {
            out.push(self.read_row(row, &columns, table)?);
            self.check_cancelled()?;
        }
        Ok(TabularResult { columns, rows: out })
    }

    /// Streams `table` through the encoder for `format` into `out`, one row at a time.
    /// Returns the number of bytes written.
    pub fn export<W: Write>(&self, table: &str, format: ExportFormat, out: W) -> Result<u64> {
        let conn = self.open()?;
        let mut stmt = self.prepare_select_all(&conn, table)?;
        let columns = column_names(&stmt);

        let mut encoder = Encoder::new(format, CountingWriter::new(out));
        encoder.begin(&columns)?;
        let mut rows = stmt.query([]).map_err(|err| self.query_err(table, err))?;
        while let Some(row) = rows.next().map_err(|err| self.query_err(table, err))? {
            let values = self.read_row(row, &columns, table)?;
            encoder.row(&values)?;
            self.check_cancelled()?;
        }
        let written = encoder.finish()?.bytes_written();
        tracing::debug!(
            db = %self.path.display(),
            table,
            format = format.name(),
            bytes = written,
            "exported table"
        );
        Ok(written)
    }

    fn open(&self) -> Result<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn =
            Connection::open_with_flags(&self.path, flags).map_err(|err| self.storage_err(err))?;
        if let Some(cancel) = &self.cancel {
            cancel.register(&conn)?;
        }
        Ok(conn)
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(cancel) => cancel.check(),
            None => Ok(()),
        }
    }

    fn catalog(&self, conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(|err| self.storage_err(err))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| self.storage_err(err))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|err| self.storage_err(err))?);
        }
        Ok(out)
    }

    fn prepare_select_all<'c>(&self, conn: &'c Connection, table: &str) -> Result<Statement<'c>> {
        // The identifier is quoted below, but only names taken from the catalog are accepted.
        let tables = self.catalog(conn)?;
        if !tables.iter().any(|name| name == table) {
            return Err(Error::NotFound(format!(
                "table {table:?} not found in {}",
                self.path.display()
            )));
        }
        conn.prepare(&select_all_sql(table))
            .map_err(|err| self.query_err(table, err))
    }

    fn read_row(&self, row: &Row<'_>, columns: &[String], table: &str) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            let value = row.get_ref(idx).map_err(|err| self.query_err(table, err))?;
            values.push(Value::from_sql(value, column)?);
        }
        Ok(values)
    }

    fn storage_err(&self, err: rusqlite::Error) -> Error {
        if err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted) {
            return Error::Cancelled;
        }
        Error::StorageUnavailable(format!("{}: {err}", self.path.display()))
    }

    fn query_err(&self, table: &str, err: rusqlite::Error) -> Error {
        if is_storage_failure(&err)
            || err.sqlite_error_code() == Some(ErrorCode::OperationInterrupted)
        {
            return self.storage_err(err);
        }
        Error::Query(format!(
            "{} table {table:?}: {err}",
            self.path.display()
        ))
    }
}

fn column_names(stmt: &Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn select_all_sql(table: &str) -> String {
    format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""))
}

fn is_storage_failure(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::PermissionDenied
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
        )
    )
}

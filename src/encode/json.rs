use std::io::Write;

use dbfs_core::{Error, Result};

use crate::table::Value;

/// One JSON array holding an object per row.
pub struct JsonArrayEncoder<W> {
    out: W,
    keys: Vec<String>,
    line: Vec<u8>,
    rows: u64,
}

impl<W: Write> JsonArrayEncoder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            keys: Vec::new(),
            line: Vec::new(),
            rows: 0,
        }
    }

    pub fn begin(&mut self, columns: &[String]) -> Result<()> {
        self.keys = encode_keys(columns)?;
        self.out.write_all(b"[")?;
        Ok(())
    }

    pub fn row(&mut self, values: &[Value]) -> Result<()> {
        super::check_width(self.keys.len(), values)?;
        self.line.clear();
        if self.rows > 0 {
            self.line.push(b',');
        }
        write_object(&mut self.line, &self.keys, values)?;
        self.out.write_all(&self.line)?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.write_all(b"]")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Newline-delimited JSON: one object per row, records separated by `\n`.
/// No newline follows the last record; an empty table encodes to nothing.
pub struct JsonLinesEncoder<W> {
    out: W,
    keys: Vec<String>,
    line: Vec<u8>,
    rows: u64,
}

impl<W: Write> JsonLinesEncoder<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            keys: Vec::new(),
            line: Vec::new(),
            rows: 0,
        }
    }

    pub fn begin(&mut self, columns: &[String]) -> Result<()> {
        self.keys = encode_keys(columns)?;
        Ok(())
    }

    pub fn row(&mut self, values: &[Value]) -> Result<()> {
        super::check_width(self.keys.len(), values)?;
        self.line.clear();
        if self.rows > 0 {
            self.line.push(b'\n');
        }
        write_object(&mut self.line, &self.keys, values)?;
        self.out.write_all(&self.line)?;
        self.rows += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }
}

fn json_err(err: serde_json::Error) -> Error {
    Error::Encoding(err.to_string())
}

fn encode_keys(columns: &[String]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|column| serde_json::to_string(column).map_err(json_err))
        .collect()
}

// Written by hand instead of through `serde_json::Map` so keys keep column order.
fn write_object(buf: &mut Vec<u8>, keys: &[String], values: &[Value]) -> Result<()> {
    buf.push(b'{');
    for (idx, (key, value)) in keys.iter().zip(values).enumerate() {
        if idx > 0 {
            buf.push(b',');
        }
        buf.extend_from_slice(key.as_bytes());
        buf.push(b':');
        write_value(buf, key, value)?;
    }
    buf.push(b'}');
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, key: &str, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Integer(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        Value::Real(f) => {
            if !f.is_finite() {
                return Err(Error::Encoding(format!(
                    "column {key} holds {f}, which JSON cannot represent"
                )));
            }
            serde_json::to_writer(&mut *buf, f).map_err(json_err)?;
        }
        Value::Text(s) => serde_json::to_writer(&mut *buf, s).map_err(json_err)?,
        Value::Blob(bytes) => {
            serde_json::to_writer(&mut *buf, &super::encode_blob(bytes)).map_err(json_err)?
        }
    }
    Ok(())
}

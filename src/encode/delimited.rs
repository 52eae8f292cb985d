use std::borrow::Cow;
use std::io::Write;

use dbfs_core::Result;

use crate::table::Value;

/// CSV-style writer: header line, then one line per row, each terminated by `\n`.
pub struct DelimitedEncoder<W> {
    out: W,
    delimiter: u8,
    width: usize,
}

impl<W: Write> DelimitedEncoder<W> {
    pub fn new(out: W, delimiter: u8) -> Self {
        Self {
            out,
            delimiter,
            width: 0,
        }
    }

    pub fn begin(&mut self, columns: &[String]) -> Result<()> {
        self.width = columns.len();
        self.write_record(columns.iter().map(|column| Cow::Borrowed(column.as_str())))
    }

    pub fn row(&mut self, values: &[Value]) -> Result<()> {
        super::check_width(self.width, values)?;
        self.write_record(values.iter().map(render))
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_record<'a>(&mut self, fields: impl Iterator<Item = Cow<'a, str>>) -> Result<()> {
        for (idx, field) in fields.enumerate() {
            if idx > 0 {
                self.out.write_all(&[self.delimiter])?;
            }
            self.write_field(&field)?;
        }
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn write_field(&mut self, field: &str) -> Result<()> {
        let delimiter = self.delimiter;
        let needs_quotes = field
            .bytes()
            .any(|b| b == delimiter || b == b'"' || b == b'\n' || b == b'\r');
        if needs_quotes {
            self.out.write_all(b"\"")?;
            self.out.write_all(field.replace('"', "\"\"").as_bytes())?;
            self.out.write_all(b"\"")?;
        } else {
            self.out.write_all(field.as_bytes())?;
        }
        Ok(())
    }
}

fn render(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::Integer(n) => Cow::Owned(n.to_string()),
        // `{:?}` is the shortest representation that parses back to the same f64.
        Value::Real(f) => Cow::Owned(format!("{f:?}")),
        Value::Text(s) => Cow::Borrowed(s),
        Value::Blob(bytes) => Cow::Owned(super::encode_blob(bytes)),
    }
}

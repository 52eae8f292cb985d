//! Row-streaming encoders for the export formats.
//!
//! Every encoder receives the column names once, then one row at a time, so a table can be
//! written to a sink without materializing the whole result. Blob cells are written as
//! standard (padded) base64 in every format.

mod delimited;
mod json;

use std::io::{self, Write};

use base64::Engine as _;

use dbfs_core::format::ExportFormat;
use dbfs_core::{Error, Result};

use crate::table::{TabularResult, Value};

pub use delimited::DelimitedEncoder;
pub use json::{JsonArrayEncoder, JsonLinesEncoder};

pub enum Encoder<W: Write> {
    Delimited(DelimitedEncoder<W>),
    JsonArray(JsonArrayEncoder<W>),
    JsonLines(JsonLinesEncoder<W>),
}

impl<W: Write> Encoder<W> {
    pub fn new(format: ExportFormat, out: W) -> Self {
        match format {
            ExportFormat::Csv => Encoder::Delimited(DelimitedEncoder::new(out, b',')),
            ExportFormat::Tsv => Encoder::Delimited(DelimitedEncoder::new(out, b'\t')),
            ExportFormat::Json => Encoder::JsonArray(JsonArrayEncoder::new(out)),
            ExportFormat::JsonLines => Encoder::JsonLines(JsonLinesEncoder::new(out)),
        }
    }

    pub fn begin(&mut self, columns: &[String]) -> Result<()> {
        match self {
            Encoder::Delimited(encoder) => encoder.begin(columns),
            Encoder::JsonArray(encoder) => encoder.begin(columns),
            Encoder::JsonLines(encoder) => encoder.begin(columns),
        }
    }

    pub fn row(&mut self, values: &[Value]) -> Result<()> {
        match self {
            Encoder::Delimited(encoder) => encoder.row(values),
            Encoder::JsonArray(encoder) => encoder.row(values),
            Encoder::JsonLines(encoder) => encoder.row(values),
        }
    }

    /// Writes any trailer, flushes, and hands the sink back.
    pub fn finish(self) -> Result<W> {
        match self {
            Encoder::Delimited(encoder) => encoder.finish(),
            Encoder::JsonArray(encoder) => encoder.finish(),
            Encoder::JsonLines(encoder) => encoder.finish(),
        }
    }
}

pub fn encode<W: Write>(result: &TabularResult, format: ExportFormat, out: W) -> Result<W> {
    let mut encoder = Encoder::new(format, out);
    encoder.begin(&result.columns)?;
    for row in &result.rows {
        encoder.row(row)?;
    }
    encoder.finish()
}

pub fn encode_to_vec(result: &TabularResult, format: ExportFormat) -> Result<Vec<u8>> {
    encode(result, format, Vec::new())
}

pub(crate) fn encode_blob(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn check_width(columns: usize, values: &[Value]) -> Result<()> {
    if columns != values.len() {
        return Err(Error::Encoding(format!(
            "row has {} values but the result has {} columns",
            values.len(),
            columns
        )));
    }
    Ok(())
}

/// Sink adapter that counts the bytes passed through it.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written = self.written.saturating_add(n as u64);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Output encoding of a table artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportFormat {
    #[serde(rename = "csv", alias = ".csv", alias = "delimited-comma")]
    Csv,
    #[serde(rename = "tsv", alias = ".tsv", alias = "delimited-tab")]
    Tsv,
    #[serde(rename = "json", alias = ".json", alias = "json-array")]
    Json,
    #[serde(rename = "jsonl", alias = ".jsonl", alias = "json-lines")]
    JsonLines,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Tsv,
        ExportFormat::Json,
        ExportFormat::JsonLines,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
            ExportFormat::JsonLines => "jsonl",
        }
    }

    /// File-name suffix of artifacts in this format, including the dot.
    pub fn suffix(self) -> &'static str {
        match self {
            ExportFormat::Csv => ".csv",
            ExportFormat::Tsv => ".tsv",
            ExportFormat::Json => ".json",
            ExportFormat::JsonLines => ".jsonl",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Tsv => "text/tab-separated-values; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::JsonLines => "application/x-ndjson",
        }
    }

    /// Field separator for the delimited-text formats.
    pub fn delimiter(self) -> Option<u8> {
        match self {
            ExportFormat::Csv => Some(b','),
            ExportFormat::Tsv => Some(b'\t'),
            ExportFormat::Json | ExportFormat::JsonLines => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" | ".csv" | "delimited-comma" => Ok(ExportFormat::Csv),
            "tsv" | ".tsv" | "delimited-tab" => Ok(ExportFormat::Tsv),
            "json" | ".json" | "json-array" => Ok(ExportFormat::Json),
            "jsonl" | ".jsonl" | "json-lines" => Ok(ExportFormat::JsonLines),
            other => Err(Error::Config(format!("unknown export format: {other:?}"))),
        }
    }
}

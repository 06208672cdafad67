//! Decoder types and traits

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Format of a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecoderFormat {
    /// Comma separated values with a header row (default)
    #[default]
    Csv,
    /// JSON array of objects, or an object holding one at `record_path`
    Json,
    /// JSON Lines format (one JSON object per line)
    Jsonl,
    /// Column-oriented JSON: `{"column": {"0": value, "1": value}}`
    JsonColumns,
}

impl DecoderFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &str) -> Result<Self> {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("csv") => Ok(Self::Csv),
            Some("json") => Ok(Self::Json),
            Some("jsonl" | "ndjson") => Ok(Self::Jsonl),
            _ => Err(Error::config(format!(
                "Cannot infer format of '{path}', set `format` explicitly"
            ))),
        }
    }
}

/// Configuration for decoding documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Document format
    #[serde(default)]
    pub format: DecoderFormat,
    /// Dot path to the records inside a JSON document
    #[serde(default)]
    pub record_path: Option<String>,
    /// CSV delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// Whether the CSV has a header row
    #[serde(default = "default_true")]
    pub has_header: bool,
}

fn default_delimiter() -> char {
    ','
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            format: DecoderFormat::Csv,
            record_path: None,
            delimiter: default_delimiter(),
            has_header: true,
        }
    }
}

impl DecoderConfig {
    /// CSV with a header row
    pub fn csv() -> Self {
        Self::default()
    }

    /// Plain JSON
    pub fn json() -> Self {
        Self {
            format: DecoderFormat::Json,
            ..Default::default()
        }
    }

    /// JSON with records under a dot path
    pub fn json_with_path(path: impl Into<String>) -> Self {
        Self {
            format: DecoderFormat::Json,
            record_path: Some(path.into()),
            ..Default::default()
        }
    }

    /// JSON Lines
    pub fn jsonl() -> Self {
        Self {
            format: DecoderFormat::Jsonl,
            ..Default::default()
        }
    }

    /// Column-oriented JSON
    pub fn json_columns() -> Self {
        Self {
            format: DecoderFormat::JsonColumns,
            ..Default::default()
        }
    }

    /// Set the CSV delimiter
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Decodes a whole document into records
pub trait RecordDecoder: Send + Sync {
    /// Decode the body into a list of records
    fn decode(&self, body: &[u8]) -> Result<Vec<JsonValue>>;
}

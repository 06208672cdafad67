//! Decoder implementations
//!
//! Each decoder handles a specific document format.

use super::types::{DecoderConfig, DecoderFormat, RecordDecoder};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use std::collections::BTreeMap;
use std::io::Read;

/// Build the decoder for a configuration
pub fn decoder_for(config: &DecoderConfig) -> Result<Box<dyn RecordDecoder>> {
    Ok(match config.format {
        DecoderFormat::Csv => Box::new(CsvDecoder::from_config(config)?),
        DecoderFormat::Json => Box::new(match &config.record_path {
            Some(path) => JsonDecoder::with_path(path.clone()),
            None => JsonDecoder::new(),
        }),
        DecoderFormat::Jsonl => Box::new(JsonlDecoder::new()),
        DecoderFormat::JsonColumns => Box::new(JsonColumnsDecoder::new()),
    })
}

fn parse_json(body: &[u8]) -> Result<JsonValue> {
    serde_json::from_slice(body).map_err(|e| Error::decode(format!("Failed to parse JSON: {e}")))
}

// ============================================================================
// JSON Decoder
// ============================================================================

/// JSON decoder with optional record path extraction
#[derive(Debug, Clone, Default)]
pub struct JsonDecoder {
    /// Dot path to the records
    record_path: Option<String>,
}

impl JsonDecoder {
    /// Create a new JSON decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: Some(path.into()),
        }
    }

    /// Records inside an already parsed document
    pub fn extract_records(&self, value: JsonValue) -> Vec<JsonValue> {
        let found = match &self.record_path {
            Some(path) => extract_simple_path(&value, path),
            None => Some(value),
        };
        match found {
            Some(JsonValue::Array(arr)) => arr,
            Some(JsonValue::Null) | None => Vec::new(),
            Some(v) => vec![v],
        }
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<JsonValue>> {
        Ok(self.extract_records(parse_json(body)?))
    }
}

// ============================================================================
// JSONL Decoder
// ============================================================================

/// JSON Lines decoder (one JSON object per line)
#[derive(Debug, Clone, Default)]
pub struct JsonlDecoder;

impl JsonlDecoder {
    /// Create a new JSONL decoder
    pub fn new() -> Self {
        Self
    }
}

impl RecordDecoder for JsonlDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<JsonValue>> {
        let body = std::str::from_utf8(body)
            .map_err(|e| Error::decode(format!("JSONL is not UTF-8: {e}")))?;
        let mut records = Vec::new();

        for (line_num, line) in body.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let value: JsonValue = serde_json::from_str(line).map_err(|e| {
                Error::decode(format!("Failed to parse JSONL at line {}: {e}", line_num + 1))
            })?;
            records.push(value);
        }

        Ok(records)
    }
}

// ============================================================================
// Column-oriented JSON Decoder
// ============================================================================

/// Decoder for column-oriented documents
///
/// `{"year": {"0": "2012", "1": "1997"}, "month": {"0": "9", "1": "1"}}`
/// becomes one record per row index. Columns may also be plain arrays.
#[derive(Debug, Clone, Default)]
pub struct JsonColumnsDecoder;

impl JsonColumnsDecoder {
    /// Create a new column-oriented decoder
    pub fn new() -> Self {
        Self
    }

    /// Transpose a parsed document into rows
    pub fn transpose(&self, value: JsonValue) -> Result<Vec<JsonValue>> {
        let JsonValue::Object(columns) = value else {
            return Err(Error::decode("column-oriented JSON must be an object"));
        };

        let mut rows: BTreeMap<RowIndex, JsonObject> = BTreeMap::new();
        for (column, cells) in columns {
            let cells: Vec<(RowIndex, JsonValue)> = match cells {
                JsonValue::Object(map) => map
                    .into_iter()
                    .map(|(index, cell)| (RowIndex::parse(index), cell))
                    .collect(),
                JsonValue::Array(arr) => arr
                    .into_iter()
                    .enumerate()
                    .map(|(i, cell)| (RowIndex::Number(i as u64), cell))
                    .collect(),
                other => {
                    return Err(Error::decode(format!(
                        "column '{column}' is not an object or array: {other}"
                    )))
                }
            };
            for (index, cell) in cells {
                rows.entry(index).or_default().insert(column.clone(), cell);
            }
        }

        Ok(rows.into_values().map(JsonValue::Object).collect())
    }
}

/// Row label of a column-oriented document; numeric labels sort numerically
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RowIndex {
    Number(u64),
    Label(String),
}

impl RowIndex {
    fn parse(label: String) -> Self {
        label
            .parse()
            .map_or(RowIndex::Label(label), RowIndex::Number)
    }
}

impl RecordDecoder for JsonColumnsDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<JsonValue>> {
        self.transpose(parse_json(body)?)
    }
}

// ============================================================================
// CSV Decoder
// ============================================================================

/// CSV decoder with configurable delimiter and header handling
#[derive(Debug, Clone)]
pub struct CsvDecoder {
    delimiter: u8,
    has_header: bool,
}

impl Default for CsvDecoder {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
        }
    }
}

impl CsvDecoder {
    /// Create a new CSV decoder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a CSV decoder from a decoder configuration
    pub fn from_config(config: &DecoderConfig) -> Result<Self> {
        let delimiter = u8::try_from(config.delimiter)
            .map_err(|_| Error::invalid_value("delimiter", "must be a single-byte character"))?;
        Ok(Self {
            delimiter,
            has_header: config.has_header,
        })
    }

    /// Read records one at a time, handing each to `f` until it returns
    /// `false`. Returns the number of records read.
    pub fn for_each<R: Read>(
        &self,
        reader: R,
        mut f: impl FnMut(JsonObject) -> bool,
    ) -> Result<u64> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Option<Vec<String>> = if self.has_header {
            let headers = rdr
                .headers()
                .map_err(|e| Error::decode(format!("Failed to read CSV header: {e}")))?;
            Some(headers.iter().map(ToString::to_string).collect())
        } else {
            None
        };

        let mut count = 0;
        for (i, row) in rdr.records().enumerate() {
            let row = row.map_err(|e| Error::decode(format!("CSV record #{}: {e}", i + 1)))?;
            let mut obj = JsonObject::new();
            for (col, cell) in row.iter().enumerate() {
                let name = match &headers {
                    Some(h) => h.get(col).cloned().unwrap_or_else(|| format!("column_{col}")),
                    None => format!("column_{col}"),
                };
                obj.insert(name, csv_cell(cell));
            }
            count += 1;
            if !f(obj) {
                break;
            }
        }
        Ok(count)
    }
}

impl RecordDecoder for CsvDecoder {
    fn decode(&self, body: &[u8]) -> Result<Vec<JsonValue>> {
        let mut records = Vec::new();
        self.for_each(body, |obj| {
            records.push(JsonValue::Object(obj));
            true
        })?;
        Ok(records)
    }
}

/// Empty cells are null; everything else stays text for the normalizer
fn csv_cell(cell: &str) -> JsonValue {
    if cell.is_empty() {
        JsonValue::Null
    } else {
        JsonValue::String(cell.to_string())
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Extract a value using simple dot-notation path (`data.items[0]`)
pub(crate) fn extract_simple_path(value: &JsonValue, path: &str) -> Option<JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() || path == "$" {
        return Some(value.clone());
    }

    let mut current = value;
    for part in path.split('.') {
        match part.find('[') {
            Some(bracket_pos) if part.ends_with(']') => {
                let name = &part[..bracket_pos];
                let index_str = &part[bracket_pos + 1..part.len() - 1];
                if !name.is_empty() {
                    current = current.get(name)?;
                }
                if index_str == "*" {
                    return Some(current.clone());
                }
                let index: i64 = index_str.parse().ok()?;
                let JsonValue::Array(arr) = current else {
                    return None;
                };
                let idx = if index < 0 {
                    arr.len().checked_sub(usize::try_from(index.unsigned_abs()).ok()?)?
                } else {
                    usize::try_from(index).ok()?
                };
                current = arr.get(idx)?;
            }
            _ => current = current.get(part)?,
        }
    }

    Some(current.clone())
}

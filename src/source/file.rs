//! Local file and inline sources

use super::types::{DocumentOptions, RecordStream, SourceAdapter};
use crate::decode::{decoder_for, CsvDecoder, DecoderConfig, DecoderFormat};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use crate::validate::RawRecord;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::debug;

/// Records buffered between a blocking reader and the pipeline
pub(crate) const CHANNEL_CAPACITY: usize = 256;

/// Stream of already decoded records, numbered from zero
pub(crate) fn records_stream(records: Vec<JsonValue>) -> RecordStream {
    stream::iter(
        records
            .into_iter()
            .enumerate()
            .map(|(i, value)| Ok(RawRecord::from_value(i as u64, value))),
    )
    .boxed()
}

/// Stream fed by a blocking producer through a bounded channel
pub(crate) fn receiver_stream(rx: mpsc::Receiver<Result<RawRecord>>) -> RecordStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}

// ============================================================================
// File Source
// ============================================================================

/// Reads a local CSV, JSON, JSONL or column-oriented JSON file
///
/// CSV files are streamed row by row; the other formats are parsed whole.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    decoder: DecoderConfig,
}

impl FileSource {
    /// Create a file source with an explicit decoder configuration
    pub fn new(path: impl Into<PathBuf>, decoder: DecoderConfig) -> Self {
        Self {
            path: path.into(),
            decoder,
        }
    }

    /// Create a file source, inferring the format from the extension
    pub fn from_options(path: impl Into<PathBuf>, options: &DocumentOptions) -> Result<Self> {
        let path = path.into();
        let decoder = options.decoder_config(&path.to_string_lossy())?;
        Ok(Self::new(path, decoder))
    }

    /// Path of the file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn unavailable(&self, message: impl Into<String>) -> Error {
        Error::source_unavailable(self.describe(), message)
    }

    fn stream_csv(&self) -> Result<RecordStream> {
        let decoder = CsvDecoder::from_config(&self.decoder)?;
        let file = std::fs::File::open(&self.path).map_err(|e| self.unavailable(e.to_string()))?;
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::task::spawn_blocking(move || {
            let mut position = 0;
            let result = decoder.for_each(BufReader::new(file), |fields| {
                let record = RawRecord::new(position, fields);
                position += 1;
                tx.blocking_send(Ok(record)).is_ok()
            });
            if let Err(e) = result {
                let _ = tx.blocking_send(Err(e));
            }
        });

        Ok(receiver_stream(rx))
    }
}

#[async_trait]
impl SourceAdapter for FileSource {
    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }

    async fn open(&self) -> Result<RecordStream> {
        if !self.path.is_file() {
            return Err(self.unavailable("file not found"));
        }
        debug!("Opening {} as {:?}", self.path.display(), self.decoder.format);

        if self.decoder.format == DecoderFormat::Csv {
            return self.stream_csv();
        }

        let body = tokio::fs::read(&self.path)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;
        let records = decoder_for(&self.decoder)?.decode(&body)?;
        Ok(records_stream(records))
    }
}

// ============================================================================
// Inline Source
// ============================================================================

/// Records declared directly in the pipeline config
#[derive(Debug, Clone, Default)]
pub struct InlineSource {
    records: Vec<JsonValue>,
}

impl InlineSource {
    /// Create an inline source
    pub fn new(records: Vec<JsonValue>) -> Self {
        Self { records }
    }

    /// Number of declared records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records are declared
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SourceAdapter for InlineSource {
    fn describe(&self) -> String {
        format!("inline ({} records)", self.records.len())
    }

    async fn open(&self) -> Result<RecordStream> {
        Ok(records_stream(self.records.clone()))
    }
}

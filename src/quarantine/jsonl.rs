//! JSON Lines quarantine
//!
//! One append-only file per entity kind: `{dir}/{table}.rejected.jsonl`.
//! Entries from earlier runs are kept; each line carries its run id.

use super::types::{QuarantineEntry, QuarantineLogger, QuarantineStore};
use crate::error::{Error, Result};
use crate::types::EntityKind;
use crate::validate::RejectedRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use uuid::Uuid;

/// Writes quarantine files under a directory
#[derive(Debug, Clone)]
pub struct JsonlQuarantine {
    dir: PathBuf,
}

impl JsonlQuarantine {
    /// Create a store rooted at `dir`; the directory is created on first open
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of a table's quarantine file
    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.rejected.jsonl"))
    }
}

#[async_trait]
impl QuarantineStore for JsonlQuarantine {
    async fn open(
        &self,
        entity: EntityKind,
        table: &str,
        run_id: Uuid,
    ) -> Result<Box<dyn QuarantineLogger>> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::quarantine(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let path = self.path_for(table);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| Error::quarantine(format!("Failed to open {}: {e}", path.display())))?;
        debug!("Quarantine for {} at {}", entity, path.display());

        Ok(Box::new(JsonlLogger {
            path,
            writer: Some(BufWriter::new(file)),
            run_id,
            written: 0,
        }))
    }
}

/// Open quarantine file
struct JsonlLogger {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    run_id: Uuid,
    written: u64,
}

#[async_trait]
impl QuarantineLogger for JsonlLogger {
    async fn append(&mut self, records: &[RejectedRecord]) -> Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::quarantine(format!("{} is closed", self.path.display())))?;

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, &QuarantineEntry::new(self.run_id, record))?;
            buf.push(b'\n');
        }

        let path = &self.path;
        writer
            .write_all(&buf)
            .await
            .map_err(|e| Error::quarantine(format!("Failed to write {}: {e}", path.display())))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::quarantine(format!("Failed to flush {}: {e}", path.display())))?;

        self.written += records.len() as u64;
        Ok(records.len())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.shutdown().await.map_err(|e| {
                Error::quarantine(format!("Failed to close {}: {e}", self.path.display()))
            })?;
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn written(&self) -> u64 {
        self.written
    }
}

/// Read every entry of a quarantine file
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<QuarantineEntry>> {
    let path = path.as_ref();
    let body = std::fs::read_to_string(path).map_err(|_| Error::FileNotFound {
        path: path.display().to_string(),
    })?;

    body.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|e| {
                Error::quarantine(format!("{} line {}: {e}", path.display(), i + 1))
            })
        })
        .collect()
}

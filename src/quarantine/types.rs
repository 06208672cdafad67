//! Quarantine types and traits

use crate::error::Result;
use crate::types::{EntityKind, JsonObject};
use crate::validate::{RejectedRecord, Violation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One persisted rejection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    /// Pipeline run that produced the rejection
    pub run_id: Uuid,
    /// Entity kind of the record
    pub entity: EntityKind,
    /// Zero-based position in the source
    pub position: u64,
    /// When the rejection was persisted
    pub rejected_at: DateTime<Utc>,
    /// Original raw fields, verbatim
    pub raw: JsonObject,
    /// Ordered violations
    pub violations: Vec<Violation>,
}

impl QuarantineEntry {
    /// Build the entry persisted for a rejected record
    pub fn new(run_id: Uuid, record: &RejectedRecord) -> Self {
        Self {
            run_id,
            entity: record.entity(),
            position: record.raw().position,
            rejected_at: Utc::now(),
            raw: record.raw().fields.clone(),
            violations: record.violations().to_vec(),
        }
    }
}

/// Append-only audit log of one entity kind's rejections for one run
///
/// Every record handed to `append` is persisted; nothing is filtered.
#[async_trait]
pub trait QuarantineLogger: Send {
    /// Persist a batch of rejections, returning how many were written
    async fn append(&mut self, records: &[RejectedRecord]) -> Result<usize>;

    /// Flush and release the log
    async fn close(&mut self) -> Result<()>;

    /// Where the rejections end up
    fn location(&self) -> String;

    /// Rejections written so far
    fn written(&self) -> u64;
}

/// Opens a quarantine log per entity kind
#[async_trait]
pub trait QuarantineStore: Send + Sync {
    /// Open the log of `entity`, whose warehouse table is `table`
    async fn open(
        &self,
        entity: EntityKind,
        table: &str,
        run_id: Uuid,
    ) -> Result<Box<dyn QuarantineLogger>>;
}

/// Quarantine settings of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineConfig {
    /// Directory of the `{table}.rejected.jsonl` files
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
}

fn default_dir() -> PathBuf {
    PathBuf::from("./quarantine")
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self { dir: default_dir() }
    }
}

//! In-memory quarantine for dry runs and tests

use super::types::{QuarantineEntry, QuarantineLogger, QuarantineStore};
use crate::error::{Error, Result};
use crate::types::EntityKind;
use crate::validate::RejectedRecord;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Keeps every rejection in memory; clones share the same entries
#[derive(Debug, Clone, Default)]
pub struct MemoryQuarantine {
    entries: Arc<Mutex<Vec<QuarantineEntry>>>,
    unavailable: bool,
}

impl MemoryQuarantine {
    /// Create an empty quarantine
    pub fn new() -> Self {
        Self::default()
    }

    /// A quarantine whose every append fails
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Snapshot of all entries, in append order
    pub fn entries(&self) -> Vec<QuarantineEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Entries of one entity kind
    pub fn entries_for(&self, entity: EntityKind) -> Vec<QuarantineEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.entity == entity)
            .collect()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether nothing was quarantined
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl QuarantineStore for MemoryQuarantine {
    async fn open(
        &self,
        entity: EntityKind,
        table: &str,
        run_id: Uuid,
    ) -> Result<Box<dyn QuarantineLogger>> {
        Ok(Box::new(MemoryLogger {
            store: self.clone(),
            location: format!("memory://{table}"),
            entity,
            run_id,
            written: 0,
        }))
    }
}

struct MemoryLogger {
    store: MemoryQuarantine,
    location: String,
    entity: EntityKind,
    run_id: Uuid,
    written: u64,
}

#[async_trait]
impl QuarantineLogger for MemoryLogger {
    async fn append(&mut self, records: &[RejectedRecord]) -> Result<usize> {
        if self.store.unavailable {
            return Err(Error::quarantine(format!(
                "{} unavailable for {}",
                self.location, self.entity
            )));
        }

        let mut entries = self
            .store
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.extend(records.iter().map(|r| QuarantineEntry::new(self.run_id, r)));
        self.written += records.len() as u64;
        Ok(records.len())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }

    fn written(&self) -> u64 {
        self.written
    }
}

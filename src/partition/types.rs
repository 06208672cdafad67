//! Partition types

use crate::validate::{CanonicalRecord, RejectedRecord, Verdict};

/// The two halves of one bounded run of verdicts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartitionedBatch {
    /// Accepted records, in source order
    pub accepted: Vec<CanonicalRecord>,
    /// Rejected records, in source order
    pub rejected: Vec<RejectedRecord>,
}

impl PartitionedBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a sequence of verdicts
    pub fn from_verdicts(verdicts: impl IntoIterator<Item = Verdict>) -> Self {
        let mut batch = Self::new();
        for verdict in verdicts {
            batch.push(verdict);
        }
        batch
    }

    /// Route one verdict to its half
    pub fn push(&mut self, verdict: Verdict) {
        match verdict {
            Verdict::Accepted(record) => self.accepted.push(record),
            Verdict::Rejected(record) => self.rejected.push(record),
        }
    }

    /// Number of verdicts in the batch
    pub fn len(&self) -> usize {
        self.accepted.len() + self.rejected.len()
    }

    /// Whether the batch holds no verdicts
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }

    /// Take both halves
    pub fn into_parts(self) -> (Vec<CanonicalRecord>, Vec<RejectedRecord>) {
        (self.accepted, self.rejected)
    }
}

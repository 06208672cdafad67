//! Loader that counts records without writing them

use super::types::{LoadError, LoadTarget, Loader};
use crate::validate::CanonicalRecord;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Accepts every batch and drops it, for dry runs
#[derive(Debug, Default)]
pub struct DiscardLoader {
    discarded: AtomicU64,
}

impl DiscardLoader {
    /// Create a discarding loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Records dropped so far
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Loader for DiscardLoader {
    async fn prepare(&self, _target: &LoadTarget) -> Result<(), LoadError> {
        Ok(())
    }

    async fn load_batch(
        &self,
        _target: &LoadTarget,
        batch: &[CanonicalRecord],
    ) -> Result<usize, LoadError> {
        self.discarded.fetch_add(batch.len() as u64, Ordering::Relaxed);
        Ok(batch.len())
    }

    fn describe(&self) -> String {
        "discard (dry run)".to_string()
    }
}

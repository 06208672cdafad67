//! One entity kind's run
//!
//! Source records stream through the validator and the partitioner.
//! Rejected batches go to a quarantine task over a bounded channel while
//! accepted batches are committed by the loader, one transaction each.

use super::types::{EntityReport, EntityState, FailureReason, RunSettings};
use crate::error::Error;
use crate::partition::partition_stream;
use crate::quarantine::QuarantineStore;
use crate::schema::EntitySchema;
use crate::source::SourceAdapter;
use crate::validate::{ReferenceIndex, RejectedRecord, Validator};
use crate::warehouse::{LoadTarget, Loader};
use futures::StreamExt;
use std::collections::HashSet;
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything one entity kind's run needs
pub(crate) struct EntityPipeline {
    pub schema: Arc<EntitySchema>,
    pub source: Arc<dyn SourceAdapter>,
    pub loader: Arc<dyn Loader>,
    pub quarantine: Arc<dyn QuarantineStore>,
    pub references: Arc<ReferenceIndex>,
    /// Publish committed keys for dependents
    pub publish_keys: bool,
    pub settings: RunSettings,
    pub run_id: Uuid,
    pub cancel: CancellationToken,
    /// Batches go through the loader but nothing counts as committed
    pub dry_run: bool,
}

impl EntityPipeline {
    /// Drive the entity to a terminal state
    pub async fn run(self, mut report: EntityReport) -> EntityReport {
        let start = Instant::now();
        report.source = Some(self.source.describe());
        self.execute(&mut report).await;
        report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match report.failure() {
            None => info!(
                entity = %report.entity,
                accepted = report.accepted,
                rejected = report.rejected,
                committed = report.committed,
                "Entity done"
            ),
            Some(reason) => warn!(
                entity = %report.entity,
                reason = %reason,
                committed = report.committed,
                error = report.error.as_deref().unwrap_or(""),
                "Entity failed"
            ),
        }
        report
    }

    async fn execute(&self, report: &mut EntityReport) {
        let entity = self.schema.entity;
        if self.cancel.is_cancelled() {
            report.fail(FailureReason::Cancelled, "run cancelled before start");
            return;
        }
        report.advance(EntityState::Extracting);
        info!(entity = %entity, source = %self.source.describe(), "Extracting");

        let records = match self.source.open().await {
            Ok(records) => records,
            Err(e) => {
                report.fail(FailureReason::from_source_error(&e), e.to_string());
                return;
            }
        };

        let mut logger = match self
            .quarantine
            .open(entity, &self.schema.table, self.run_id)
            .await
        {
            Ok(logger) => logger,
            Err(e) => {
                report.fail(FailureReason::QuarantineUnavailable, e.to_string());
                return;
            }
        };
        report.quarantine = Some(logger.location());

        let (rejected_tx, mut rejected_rx) =
            mpsc::channel::<Vec<RejectedRecord>>(self.settings.quarantine_backlog.max(1));
        let quarantine_task = tokio::spawn(async move {
            while let Some(batch) = rejected_rx.recv().await {
                let written = logger.append(&batch).await?;
                debug!(entity = %entity, rejected = written, "Quarantine flushed");
            }
            logger.close().await?;
            Ok::<u64, Error>(logger.written())
        });

        let mut validator = Validator::new(Arc::clone(&self.schema));
        if self.settings.check_references {
            validator =
                validator.with_references(self.references.snapshot(&self.schema.references()));
        }
        let verdicts = records.map(move |item| item.map(|raw| validator.validate(raw)));
        let mut batches = pin!(partition_stream(verdicts, self.settings.batch_size));

        let target = LoadTarget::from_schema(&self.schema);
        let mut prepared = false;
        let mut keys = HashSet::new();

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    report.fail(FailureReason::Cancelled, "run cancelled");
                    break;
                }
                next = batches.next() => next,
            };

            let batch = match next {
                None => break,
                Some(Ok(batch)) => batch,
                Some(Err(e)) => {
                    report.fail(FailureReason::from_source_error(&e), e.to_string());
                    break;
                }
            };

            if report.state == EntityState::Extracting {
                report.advance(EntityState::Validating);
            }
            let (accepted, rejected) = batch.into_parts();
            report.accepted += accepted.len() as u64;
            report.rejected += rejected.len() as u64;

            if !rejected.is_empty() && rejected_tx.send(rejected).await.is_err() {
                report.failed += accepted.len() as u64;
                report.fail(FailureReason::QuarantineUnavailable, "quarantine writer stopped");
                break;
            }
            if accepted.is_empty() {
                continue;
            }

            if report.state == EntityState::Validating {
                report.advance(EntityState::Loading);
            }
            if !prepared {
                if let Err(e) = self.loader.prepare(&target).await {
                    report.failed += accepted.len() as u64;
                    report.fail(FailureReason::from(&e), e.to_string());
                    break;
                }
                prepared = true;
            }
            if self.cancel.is_cancelled() {
                report.failed += accepted.len() as u64;
                report.fail(FailureReason::Cancelled, "run cancelled");
                break;
            }

            match self.loader.load_batch(&target, &accepted).await {
                Ok(committed) => {
                    if !self.dry_run {
                        report.committed += committed as u64;
                    }
                    report.batches += 1;
                    info!(
                        entity = %entity,
                        batch = report.batches,
                        committed,
                        "Batch committed"
                    );
                    if self.publish_keys {
                        keys.extend(accepted.iter().map(|record| record.key(&target.key)));
                    }
                }
                Err(e) => {
                    report.failed += accepted.len() as u64;
                    report.fail(FailureReason::from(&e), e.to_string());
                    break;
                }
            }
        }

        drop(rejected_tx);
        match quarantine_task.await {
            Ok(Ok(written)) => debug!(entity = %entity, written, "Quarantine closed"),
            Ok(Err(e)) => report.fail(FailureReason::QuarantineUnavailable, e.to_string()),
            Err(e) => report.fail(FailureReason::Internal, format!("quarantine task: {e}")),
        }

        if report.state == EntityState::Extracting {
            report.advance(EntityState::Validating);
        }
        if report.state == EntityState::Validating {
            report.advance(EntityState::Loading);
        }
        if report.state == EntityState::Loading {
            report.advance(EntityState::Done);
            if self.publish_keys {
                self.references.publish(entity, keys);
            }
        }
    }
}

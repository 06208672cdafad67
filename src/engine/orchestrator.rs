//! Dependency-ordered scheduling of entity pipelines

use super::pipeline::EntityPipeline;
use super::types::{EntityReport, EntityState, FailureReason, RunSettings, RunSummary};
use crate::error::Result;
use crate::quarantine::QuarantineStore;
use crate::schema::SchemaRegistry;
use crate::source::SourceAdapter;
use crate::types::EntityKind;
use crate::validate::ReferenceIndex;
use crate::warehouse::Loader;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs entity pipelines in dependency order on a bounded worker pool
pub struct Orchestrator {
    registry: Arc<SchemaRegistry>,
    sources: HashMap<EntityKind, Arc<dyn SourceAdapter>>,
    loader: Arc<dyn Loader>,
    quarantine: Arc<dyn QuarantineStore>,
    settings: RunSettings,
    references: Arc<ReferenceIndex>,
    cancel: CancellationToken,
    dry_run: bool,
}

impl Orchestrator {
    /// Create an orchestrator without sources
    pub fn new(
        registry: Arc<SchemaRegistry>,
        loader: Arc<dyn Loader>,
        quarantine: Arc<dyn QuarantineStore>,
    ) -> Self {
        Self {
            registry,
            sources: HashMap::new(),
            loader,
            quarantine,
            settings: RunSettings::default(),
            references: Arc::new(ReferenceIndex::new()),
            cancel: CancellationToken::new(),
            dry_run: false,
        }
    }

    /// Register the source of an entity kind
    #[must_use]
    pub fn with_source(mut self, kind: EntityKind, source: Arc<dyn SourceAdapter>) -> Self {
        self.sources.insert(kind, source);
        self
    }

    /// Set run settings
    #[must_use]
    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Mark summaries as dry runs
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Token that cancels the run at the next batch boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Keys committed so far
    pub fn references(&self) -> &Arc<ReferenceIndex> {
        &self.references
    }

    /// Entity kinds with a source, in dependency order
    pub fn configured(&self) -> Vec<EntityKind> {
        self.registry
            .dependency_order()
            .iter()
            .copied()
            .filter(|kind| self.sources.contains_key(kind))
            .collect()
    }

    /// Run the selected entity kinds, or every configured one if `selected`
    /// is empty
    pub async fn run(&self, selected: &[EntityKind]) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::new(run_id);
        summary.dry_run = self.dry_run;

        let order: Vec<EntityKind> = if selected.is_empty() {
            self.configured()
        } else {
            self.registry
                .dependency_order()
                .iter()
                .copied()
                .filter(|kind| selected.contains(kind))
                .collect()
        };
        info!(run_id = %run_id, entities = ?order, "Starting run");

        let mut reports: BTreeMap<EntityKind, EntityReport> = BTreeMap::new();
        for kind in &order {
            let schema = self.registry.require(*kind)?;
            reports.insert(*kind, EntityReport::new(*kind, schema.table.clone()));
        }

        let mut waiting = order.clone();
        let mut running = 0usize;
        let workers = Arc::new(Semaphore::new(self.settings.max_workers.max(1)));
        let mut tasks: JoinSet<EntityReport> = JoinSet::new();

        loop {
            let mut still_waiting = Vec::with_capacity(waiting.len());
            for kind in waiting {
                let deps: Vec<(EntityKind, Option<EntityState>)> = self
                    .registry
                    .dependencies_of(kind)
                    .iter()
                    .filter(|dep| order.contains(dep))
                    .map(|dep| (*dep, reports.get(dep).map(|r| r.state)))
                    .collect();

                if let Some((dep, _)) = deps
                    .iter()
                    .find(|(_, state)| matches!(state, Some(EntityState::Failed(_))))
                {
                    warn!(entity = %kind, dependency = %dep, "Skipping entity");
                    if let Some(report) = reports.get_mut(&kind) {
                        report.fail(
                            FailureReason::DependencyFailed,
                            format!("dependency '{dep}' failed"),
                        );
                    }
                    continue;
                }
                if self.cancel.is_cancelled() {
                    if let Some(report) = reports.get_mut(&kind) {
                        report.fail(FailureReason::Cancelled, "run cancelled before start");
                    }
                    continue;
                }
                // Running dependencies are out of `reports` until they finish
                if !deps.iter().all(|(_, state)| *state == Some(EntityState::Done)) {
                    still_waiting.push(kind);
                    continue;
                }
                let Ok(permit) = Arc::clone(&workers).try_acquire_owned() else {
                    still_waiting.push(kind);
                    continue;
                };

                let Some(report) = reports.remove(&kind) else {
                    continue;
                };
                match self.pipeline(kind, run_id) {
                    Ok(pipeline) => {
                        debug!(entity = %kind, "Scheduling entity");
                        running += 1;
                        tasks.spawn(async move {
                            let fallback = report.clone();
                            let outcome = tokio::spawn(pipeline.run(report)).await;
                            drop(permit);
                            outcome.unwrap_or_else(|e| {
                                error!(entity = %kind, error = %e, "Entity pipeline panicked");
                                let mut report = fallback;
                                report.fail(FailureReason::Internal, e.to_string());
                                report
                            })
                        });
                    }
                    Err((reason, message)) => {
                        let mut report = report;
                        report.fail(reason, message);
                        reports.insert(kind, report);
                    }
                }
            }
            waiting = still_waiting;

            if running == 0 {
                for kind in &waiting {
                    if let Some(report) = reports.get_mut(kind) {
                        report.fail(FailureReason::Internal, "dependencies never completed");
                    }
                }
                break;
            }

            match tasks.join_next().await {
                Some(Ok(report)) => {
                    running -= 1;
                    reports.insert(report.entity, report);
                }
                Some(Err(e)) => {
                    running -= 1;
                    error!(error = %e, "Worker task failed");
                }
                None => running = 0,
            }
        }

        summary.entities = order
            .iter()
            .filter_map(|kind| reports.remove(kind))
            .collect();
        summary.finished_at = Some(Utc::now());
        info!(
            run_id = %run_id,
            committed = summary.total_committed(),
            rejected = summary.total_rejected(),
            failed = summary.failed().count(),
            "Run finished"
        );
        Ok(summary)
    }

    fn pipeline(
        &self,
        kind: EntityKind,
        run_id: Uuid,
    ) -> std::result::Result<EntityPipeline, (FailureReason, String)> {
        let schema = self
            .registry
            .require(kind)
            .map_err(|e| (FailureReason::SchemaMisconfigured, e.to_string()))?;
        let source = self.sources.get(&kind).cloned().ok_or_else(|| {
            (
                FailureReason::SourceUnavailable,
                format!("no source configured for '{kind}'"),
            )
        })?;

        Ok(EntityPipeline {
            schema,
            source,
            loader: Arc::clone(&self.loader),
            quarantine: Arc::clone(&self.quarantine),
            references: Arc::clone(&self.references),
            publish_keys: self.registry.is_referenced(kind),
            settings: self.settings.clone(),
            run_id,
            cancel: self.cancel.clone(),
            dry_run: self.dry_run,
        })
    }
}

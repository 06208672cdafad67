//! Engine types
//!
//! Entity state machine, run settings and the run summary.

use crate::error::{Error, Result};
use crate::types::EntityKind;
use crate::warehouse::LoadError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

// ============================================================================
// Entity State Machine
// ============================================================================

/// Why an entity kind ended `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureReason {
    /// The source could not be reached or read
    SourceUnavailable,
    /// Schema or source configuration does not fit the entity
    SchemaMisconfigured,
    /// The warehouse connection dropped during a batch commit
    ConnectionLost,
    /// The warehouse refused a batch
    ConstraintViolation,
    /// Rejected records could not be persisted
    QuarantineUnavailable,
    /// A dependency of this entity kind failed
    DependencyFailed,
    /// The run was cancelled
    Cancelled,
    /// The entity pipeline panicked
    Internal,
}

impl FailureReason {
    /// Reason name as shown in summaries
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceUnavailable => "SourceUnavailable",
            Self::SchemaMisconfigured => "SchemaMisconfigured",
            Self::ConnectionLost => "ConnectionLost",
            Self::ConstraintViolation => "ConstraintViolation",
            Self::QuarantineUnavailable => "QuarantineUnavailable",
            Self::DependencyFailed => "DependencyFailed",
            Self::Cancelled => "Cancelled",
            Self::Internal => "Internal",
        }
    }

    /// Classify a source error
    pub fn from_source_error(error: &Error) -> Self {
        if error.is_source_unavailable() {
            Self::SourceUnavailable
        } else {
            Self::SchemaMisconfigured
        }
    }
}

impl From<&LoadError> for FailureReason {
    fn from(error: &LoadError) -> Self {
        match error {
            LoadError::ConstraintViolation { .. } => Self::ConstraintViolation,
            LoadError::ConnectionLost { .. } => Self::ConnectionLost,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one entity kind within a run
///
/// `Pending -> Extracting -> Validating -> Loading -> Done`, with `Failed`
/// reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum EntityState {
    Pending,
    Extracting,
    Validating,
    Loading,
    Done,
    Failed(FailureReason),
}

impl EntityState {
    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed(_))
    }

    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(self, next: EntityState) -> bool {
        match (self, next) {
            (Self::Done | Self::Failed(_), _) => false,
            (_, Self::Failed(_)) => true,
            (Self::Pending, Self::Extracting)
            | (Self::Extracting, Self::Validating)
            | (Self::Validating, Self::Loading)
            | (Self::Loading, Self::Done) => true,
            _ => false,
        }
    }

    /// Failure reason, if failed
    pub fn failure(self) -> Option<FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("Pending"),
            Self::Extracting => f.write_str("Extracting"),
            Self::Validating => f.write_str("Validating"),
            Self::Loading => f.write_str("Loading"),
            Self::Done => f.write_str("Done"),
            Self::Failed(reason) => write!(f, "Failed({reason})"),
        }
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(flatten)]
    pub state: EntityState,
    pub at: DateTime<Utc>,
}

// ============================================================================
// Run Settings
// ============================================================================

/// Knobs of one orchestrated run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Maximum verdicts per partitioned batch
    pub batch_size: usize,
    /// Maximum entity kinds running concurrently
    pub max_workers: usize,
    /// Reject references to keys not committed earlier in the run
    pub check_references: bool,
    /// Rejected batches buffered ahead of the quarantine writer
    pub quarantine_backlog: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            max_workers: 3,
            check_references: true,
            quarantine_backlog: 16,
        }
    }
}

impl RunSettings {
    /// Create default run settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set batch size
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the worker pool size
    #[must_use]
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Enable or disable reference checks
    #[must_use]
    pub fn with_reference_checks(mut self, enabled: bool) -> Self {
        self.check_references = enabled;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one entity kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: EntityKind,
    pub table: String,
    pub source: Option<String>,
    pub state: EntityState,
    pub history: Vec<Transition>,
    /// Records that passed validation
    pub accepted: u64,
    /// Records routed to the quarantine
    pub rejected: u64,
    /// Records durably written by the loader
    pub committed: u64,
    /// Accepted records that were not committed
    pub failed: u64,
    pub batches: u64,
    pub quarantine: Option<String>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl EntityReport {
    /// Create a `Pending` report
    pub fn new(entity: EntityKind, table: impl Into<String>) -> Self {
        Self {
            entity,
            table: table.into(),
            source: None,
            state: EntityState::Pending,
            history: vec![Transition {
                state: EntityState::Pending,
                at: Utc::now(),
            }],
            accepted: 0,
            rejected: 0,
            committed: 0,
            failed: 0,
            batches: 0,
            quarantine: None,
            error: None,
            duration_ms: 0,
        }
    }

    /// Move to `next`, returning false if the transition is illegal
    pub fn advance(&mut self, next: EntityState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.history.push(Transition {
            state: next,
            at: Utc::now(),
        });
        true
    }

    /// Move to `Failed(reason)` and keep the first error message
    pub fn fail(&mut self, reason: FailureReason, message: impl Into<String>) {
        if self.advance(EntityState::Failed(reason)) && self.error.is_none() {
            self.error = Some(message.into());
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == EntityState::Done
    }

    pub fn failure(&self) -> Option<FailureReason> {
        self.state.failure()
    }

    /// States visited, in order
    pub fn states(&self) -> Vec<EntityState> {
        self.history.iter().map(|t| t.state).collect()
    }
}

/// Summary of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub entities: Vec<EntityReport>,
}

impl RunSummary {
    /// Start a summary for a new run
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            dry_run: false,
            entities: Vec::new(),
        }
    }

    /// Report of one entity kind
    pub fn entity(&self, kind: EntityKind) -> Option<&EntityReport> {
        self.entities.iter().find(|r| r.entity == kind)
    }

    /// Whether no entity kind failed
    pub fn is_success(&self) -> bool {
        self.entities.iter().all(|r| r.failure().is_none())
    }

    /// Entity kinds that ended `Failed`
    pub fn failed(&self) -> impl Iterator<Item = &EntityReport> {
        self.entities.iter().filter(|r| r.failure().is_some())
    }

    pub fn total_committed(&self) -> u64 {
        self.entities.iter().map(|r| r.committed).sum()
    }

    pub fn total_rejected(&self) -> u64 {
        self.entities.iter().map(|r| r.rejected).sum()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Human-readable table
    pub fn render_table(&self) -> String {
        let mut out = format!("Run {}", self.run_id);
        if self.dry_run {
            out.push_str(" (dry run)");
        }
        out.push('\n');
        out.push_str(&format!(
            "{:<10} {:<28} {:>9} {:>9} {:>10} {:>7}  {}\n",
            "ENTITY", "STATE", "ACCEPTED", "REJECTED", "COMMITTED", "FAILED", "QUARANTINE"
        ));
        for report in &self.entities {
            out.push_str(&format!(
                "{:<10} {:<28} {:>9} {:>9} {:>10} {:>7}  {}\n",
                report.entity.as_str(),
                report.state.to_string(),
                report.accepted,
                report.rejected,
                report.committed,
                report.failed,
                report.quarantine.as_deref().unwrap_or("-"),
            ));
        }
        for report in self.failed() {
            if let Some(error) = &report.error {
                out.push_str(&format!("{}: {}\n", report.entity, error));
            }
        }
        out
    }

    /// Write the JSON summary via a temp file and rename
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = path.with_extension("tmp");
        tokio::fs::write(&temp, self.to_json()?).await?;
        tokio::fs::rename(&temp, path).await?;
        Ok(())
    }
}

//! Pipeline orchestration
//!
//! Sequences source, validator, partitioner, quarantine and loader for each
//! entity kind, and entity kinds in dependency order.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Orchestrator` - Schedules entity pipelines on a bounded worker pool
//! - `EntityState` / `FailureReason` - Per-entity state machine
//! - `RunSummary` - Per-entity counts, terminal states and quarantine locations
//!
//! An entity kind starts only once every selected dependency is `Done`. A
//! failed dependency fails its dependents with `DependencyFailed` before
//! their source or loader is touched. Independent entity kinds run
//! concurrently and may finish in any order.
//!
//! # Example
//!
//! ```ignore
//! use retail_etl::engine::{Orchestrator, RunSettings};
//!
//! let orchestrator = Orchestrator::new(registry, loader, quarantine)
//!     .with_source(EntityKind::User, users)
//!     .with_settings(RunSettings::new().with_batch_size(1000));
//! let summary = orchestrator.run(&[]).await?;
//! println!("{}", summary.render_table());
//! ```

mod orchestrator;
mod pipeline;
mod types;

pub use orchestrator::Orchestrator;
pub use types::{EntityReport, EntityState, FailureReason, RunSettings, RunSummary, Transition};

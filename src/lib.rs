//! # Retail ETL
//!
//! Extraction, normalization and validation pipeline for a retail
//! warehouse: five dimensions (users, stores, products, cards, dates) and
//! one order fact table.
//!
//! ## Features
//!
//! - **Mixed Sources**: CSV/JSON files, S3/GCS/Azure objects, HTTP documents,
//!   a paginated store API and external database tables
//! - **Declarative Schemas**: One YAML declaration per entity kind, evaluated
//!   by a single validator
//! - **Complete Audit**: Every rejected record is quarantined with all of its
//!   violations, never only the first
//! - **Atomic Batches**: Each accepted batch is one warehouse transaction
//! - **Dependency Order**: Dimensions load before the facts referencing them
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retail_etl::config::PipelineConfig;
//! use retail_etl::engine::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> retail_etl::Result<()> {
//!     let config = PipelineConfig::from_file("pipeline.yaml")?;
//!     let registry = Arc::new(config.registry()?);
//!     let loader = Arc::new(DuckDbWarehouse::open(&config.warehouse)?);
//!     let quarantine = Arc::new(JsonlQuarantine::new(&config.quarantine.dir));
//!
//!     let mut orchestrator = Orchestrator::new(registry, loader, quarantine)
//!         .with_settings(config.run_settings());
//!     for (kind, source) in config.build_sources()? {
//!         orchestrator = orchestrator.with_source(kind, source);
//!     }
//!
//!     let summary = orchestrator.run(&[]).await?;
//!     println!("{}", summary.render_table());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Pipeline Orchestrator                      │
//! │   dependency order · worker pool · cancellation · run summary   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                 │ per entity kind
//! ┌──────────┬────────────┬───────┴──────┬─────────────┬────────────┐
//! │  Source  │ Normalizer │  Validator   │ Partitioner │   Sinks    │
//! ├──────────┼────────────┼──────────────┼─────────────┼────────────┤
//! │ File     │ Trim/Case  │ Field checks │ Accepted    │ Loader     │
//! │ Object   │ Money      │ Cross checks │ Rejected    │  (DuckDB / │
//! │ HTTP     │ Dates      │ References   │ Bounded     │  Postgres) │
//! │ API      │ Codes      │ Derived      │  batches    │ Quarantine │
//! │ Database │ Weights    │              │             │  (JSONL)   │
//! └──────────┴────────────┴──────────────┴─────────────┴────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Template interpolation
pub mod template;

/// Pipeline configuration
pub mod config;

/// Field normalization rules
pub mod normalize;

/// Entity schema declarations and registry
pub mod schema;

/// Record validation
pub mod validate;

/// Verdict partitioning
pub mod partition;

/// Document decoders (CSV, JSON, JSONL)
pub mod decode;

/// HTTP client with retry and rate limiting
pub mod http;

/// Source adapters
pub mod source;

/// Rejected record logging
pub mod quarantine;

/// Warehouse loaders
pub mod warehouse;

/// Pipeline orchestration
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use engine::{EntityState, FailureReason, Orchestrator, RunSummary};
pub use validate::{validate, CanonicalRecord, RawRecord, RejectedRecord, Verdict};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

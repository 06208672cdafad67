//! Pipeline configuration
//!
//! One YAML file declares where every entity kind comes from, the warehouse
//! to load into and where rejected records go:
//!
//! ```yaml
//! vars:
//!   bucket: data-handling-public
//! sources:
//!   user:
//!     type: database
//!     engine: postgres
//!     host: "{{ env.RDS_HOST }}"
//!     user: "{{ env.RDS_USER }}"
//!     password: "{{ env.RDS_PASSWORD }}"
//!     database: postgres
//!     table: legacy_users
//!   product:
//!     type: object_store
//!     url: "s3://{{ vars.bucket }}/products.csv"
//! warehouse:
//!   path: warehouse.duckdb
//! batch_size: 500
//! ```
//!
//! Templates are rendered once at load time. `detail_url` of an API source
//! keeps its per-request placeholders.

use crate::engine::RunSettings;
use crate::error::{Error, Result};
use crate::quarantine::QuarantineConfig;
use crate::schema::SchemaRegistry;
use crate::source::{build_source, SourceAdapter, SourceConfig};
use crate::template::{render_yaml, TemplateContext};
use crate::types::EntityKind;
use crate::warehouse::WarehouseConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

// ============================================================================
// Top-Level Pipeline Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Values available to templates as `{{ vars.name }}`
    #[serde(default)]
    pub vars: serde_json::Value,

    /// Source of each entity kind
    pub sources: BTreeMap<EntityKind, SourceConfig>,

    /// Destination warehouse
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Rejected record log
    #[serde(default)]
    pub quarantine: QuarantineConfig,

    /// Maximum verdicts per batch commit
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Entity kinds running at once
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Reject references to keys not loaded in the same run
    #[serde(default = "default_true")]
    pub check_references: bool,

    /// Directory of `*.yaml` schemas replacing the built-in ones
    #[serde(default)]
    pub schemas_dir: Option<PathBuf>,
}

fn default_batch_size() -> usize {
    500
}

fn default_max_workers() -> usize {
    3
}

fn default_true() -> bool {
    true
}

impl PipelineConfig {
    /// Load and validate a pipeline config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            }
        })?;
        debug!("Loaded pipeline config from {}", path.display());
        Self::from_str_with(&content, TemplateContext::new())
    }

    /// Load and validate a pipeline config from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_str_with(yaml, TemplateContext::new())
    }

    /// Load with a prepared template context (environment overrides)
    pub fn from_str_with(yaml: &str, mut ctx: TemplateContext) -> Result<Self> {
        let document: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse pipeline YAML: {e}")))?;

        // vars may read the environment but not each other
        let vars = match document.get("vars") {
            Some(vars) => render_yaml(vars, &ctx)?,
            None => serde_yaml::Value::Null,
        };
        ctx.set_vars(serde_json::to_value(&vars)?);

        let rendered = render_yaml(&document, &ctx)?;
        let config: PipelineConfig = serde_yaml::from_value(rendered)
            .map_err(|e| Error::config(format!("Invalid pipeline config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config without touching any source
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::config("Pipeline must declare at least one source"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_value("batch_size", "must be positive"));
        }
        if self.max_workers == 0 {
            return Err(Error::invalid_value("max_workers", "must be positive"));
        }
        if self.warehouse.max_connections == 0 {
            return Err(Error::invalid_value(
                "warehouse.max_connections",
                "must be positive",
            ));
        }
        if self.warehouse.path.is_some() && self.warehouse.postgres.is_some() {
            return Err(Error::invalid_value(
                "warehouse",
                "set either 'path' or 'postgres', not both",
            ));
        }

        // Adapter constructors check URLs, formats and table/query choice
        for (kind, source) in &self.sources {
            build_source(source).map_err(|e| {
                Error::invalid_value(format!("sources.{kind}"), e.to_string())
            })?;
        }
        Ok(())
    }

    /// Settings for the orchestrator
    pub fn run_settings(&self) -> RunSettings {
        RunSettings::new()
            .with_batch_size(self.batch_size)
            .with_max_workers(self.max_workers)
            .with_reference_checks(self.check_references)
    }

    /// Schemas with any overrides from `schemas_dir`
    pub fn registry(&self) -> Result<SchemaRegistry> {
        SchemaRegistry::load(self.schemas_dir.as_deref())
    }

    /// Build the adapter of every configured source
    pub fn build_sources(&self) -> Result<Vec<(EntityKind, Arc<dyn SourceAdapter>)>> {
        self.sources
            .iter()
            .map(|(kind, config)| Ok((*kind, build_source(config)?)))
            .collect()
    }

    /// Configured entity kinds
    pub fn entities(&self) -> Vec<EntityKind> {
        self.sources.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MINIMAL: &str = r#"
sources:
  date_time:
    type: inline
    records:
      - { timestamp: "22:00:06", month: "9", year: "2012", day: "19" }
"#;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.max_workers, 3);
        assert!(config.check_references);
        assert_eq!(config.warehouse.max_connections, 2);
        assert_eq!(config.quarantine.dir, PathBuf::from("./quarantine"));
        assert_eq!(config.entities(), vec![EntityKind::DateTime]);

        let settings = config.run_settings();
        assert_eq!(settings.batch_size, 500);
        assert_eq!(settings.max_workers, 3);
    }

    #[test]
    fn test_templates_render_env_and_vars() {
        let yaml = r#"
vars:
  bucket: data-handling-public
  key: "{{ env.STORE_API_KEY }}"
sources:
  product:
    type: object_store
    url: "s3://{{ vars.bucket }}/products.csv"
  store:
    type: api
    count_url: https://api.example.com/prod/number_stores
    detail_url: "https://api.example.com/prod/store_details/{{ store_number }}"
    http:
      headers:
        x-api-key: "{{ vars.key }}"
"#;
        let mut ctx = TemplateContext::new();
        ctx.set_env("STORE_API_KEY", "secret");
        let config = PipelineConfig::from_str_with(yaml, ctx).unwrap();

        match &config.sources[&EntityKind::Product] {
            SourceConfig::ObjectStore { url, .. } => {
                assert_eq!(url, "s3://data-handling-public/products.csv");
            }
            other => panic!("unexpected source: {other:?}"),
        }
        match &config.sources[&EntityKind::Store] {
            SourceConfig::Api(api) => {
                assert_eq!(
                    api.detail_url,
                    "https://api.example.com/prod/store_details/{{ store_number }}"
                );
                assert_eq!(api.http.headers.get("x-api-key").unwrap(), "secret");
            }
            other => panic!("unexpected source: {other:?}"),
        }
    }

    #[test]
    fn test_undefined_variable_is_fatal() {
        let yaml = r#"
sources:
  user:
    type: file
    path: "{{ vars.missing }}/users.csv"
"#;
        let err = PipelineConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable { .. }), "{err}");
    }

    #[test]
    fn test_validation_errors() {
        assert!(PipelineConfig::from_yaml("sources: {}").is_err());

        let zero_batch = format!("{MINIMAL}batch_size: 0\n");
        assert!(PipelineConfig::from_yaml(&zero_batch)
            .unwrap_err()
            .to_string()
            .contains("batch_size"));

        let bad_url = r#"
sources:
  store:
    type: http
    url: "not a url"
"#;
        assert!(PipelineConfig::from_yaml(bad_url)
            .unwrap_err()
            .to_string()
            .contains("sources.store"));

        let unknown_entity = r#"
sources:
  invoice:
    type: inline
    records: []
"#;
        assert!(PipelineConfig::from_yaml(unknown_entity).is_err());
    }

    #[test]
    fn test_database_needs_table_or_query() {
        let yaml = r#"
sources:
  user:
    type: database
    engine: sqlite
    database: users.db
"#;
        assert!(PipelineConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_file("/nonexistent/pipeline.yaml").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn test_builds_sources() {
        let config = PipelineConfig::from_yaml(MINIMAL).unwrap();
        let sources = config.build_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].1.describe(), "inline (1 records)");
        assert!(config.registry().is_ok());
    }
}

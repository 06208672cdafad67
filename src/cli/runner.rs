//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::config::PipelineConfig;
use crate::engine::{Orchestrator, RunSummary};
use crate::error::Result;
use crate::quarantine::{JsonlQuarantine, QuarantineStore};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::EntityKind;
use crate::warehouse::{DiscardLoader, DuckDbWarehouse, Loader, WarehouseConfig};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command. `Ok(false)` means the command ran but some
    /// entity kind failed.
    pub async fn run(&self) -> Result<bool> {
        match &self.cli.command {
            Commands::Run {
                entities,
                summary,
                dry_run,
            } => {
                self.run_pipeline(entities.as_deref(), summary.as_deref(), *dry_run)
                    .await
            }
            Commands::Check => self.check().map(|()| true),
            Commands::Schemas { entity } => self.schemas(entity.as_deref()).map(|()| true),
        }
    }

    fn load_config(&self) -> Result<PipelineConfig> {
        PipelineConfig::from_file(&self.cli.config)
    }

    /// Run the pipeline
    async fn run_pipeline(
        &self,
        entities: Option<&str>,
        summary_path: Option<&Path>,
        dry_run: bool,
    ) -> Result<bool> {
        let config = self.load_config()?;
        let registry = Arc::new(config.registry()?);
        let selected = match entities {
            Some(list) => EntityKind::parse_list(list)?,
            None => Vec::new(),
        };

        let loader: Arc<dyn Loader> = if dry_run {
            Arc::new(DiscardLoader::new())
        } else {
            Arc::new(DuckDbWarehouse::open(&config.warehouse)?)
        };
        let quarantine: Arc<dyn QuarantineStore> =
            Arc::new(JsonlQuarantine::new(&config.quarantine.dir));
        info!(
            loader = %loader.describe(),
            quarantine = %config.quarantine.dir.display(),
            "Pipeline ready"
        );

        let mut orchestrator = Orchestrator::new(registry, loader, quarantine)
            .with_settings(config.run_settings())
            .with_dry_run(dry_run);
        for (kind, source) in config.build_sources()? {
            orchestrator = orchestrator.with_source(kind, source);
        }

        let token = orchestrator.cancellation_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping at the next batch boundary");
                token.cancel();
            }
        });
        let summary = orchestrator.run(&selected).await;
        interrupt.abort();
        let summary = summary?;

        if let Some(path) = summary_path {
            summary.write_to(path).await?;
            info!("Run summary written to {}", path.display());
        }
        self.print_summary(&summary)?;
        Ok(summary.is_success())
    }

    /// Show what a run would do
    fn check(&self) -> Result<()> {
        let config = self.load_config()?;
        let registry = config.registry()?;
        let sources: serde_json::Map<String, Value> = config
            .build_sources()?
            .into_iter()
            .map(|(kind, source)| {
                let kind_name = config.sources[&kind].kind();
                (
                    kind.to_string(),
                    json!({ "type": kind_name, "location": source.describe() }),
                )
            })
            .collect();
        let order: Vec<&str> = registry
            .dependency_order()
            .iter()
            .filter(|kind| config.sources.contains_key(kind))
            .map(|kind| kind.as_str())
            .collect();

        self.output(&json!({
            "dependency_order": order,
            "sources": sources,
            "warehouse": describe_warehouse(&config.warehouse),
            "quarantine": config.quarantine.dir.display().to_string(),
            "batch_size": config.batch_size,
            "max_workers": config.max_workers,
        }));
        Ok(())
    }

    /// Show compiled schemas
    fn schemas(&self, entity: Option<&str>) -> Result<()> {
        // Schemas work without a pipeline config
        let registry = if self.cli.config.exists() {
            self.load_config()?.registry()?
        } else {
            SchemaRegistry::builtin()?
        };

        let kinds = match entity {
            Some(name) => vec![name.parse::<EntityKind>()?],
            None => registry.dependency_order().to_vec(),
        };
        let schemas = kinds
            .into_iter()
            .map(|kind| registry.require(kind).map(|schema| describe_schema(&schema)))
            .collect::<Result<Vec<_>>>()?;

        self.output(&Value::Array(schemas));
        Ok(())
    }

    fn print_summary(&self, summary: &RunSummary) -> Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", summary.to_json()?),
            OutputFormat::Pretty => print!("{}", summary.render_table()),
        }
        Ok(())
    }

    /// Output a message
    fn output(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn describe_warehouse(config: &WarehouseConfig) -> String {
    match (&config.path, &config.postgres) {
        (_, Some(postgres)) => postgres.redacted(),
        (Some(path), None) => path.clone(),
        (None, None) => "in-memory".to_string(),
    }
}

fn describe_schema(schema: &EntitySchema) -> Value {
    let columns: Vec<Value> = schema
        .columns()
        .into_iter()
        .map(|(name, sql_type)| json!({ "name": name, "type": sql_type }))
        .collect();
    json!({
        "entity": schema.entity.as_str(),
        "table": schema.table,
        "key": schema.key,
        "columns": columns,
        "references": schema
            .references()
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>(),
    })
}

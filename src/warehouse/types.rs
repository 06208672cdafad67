//! Loader types and traits

use crate::schema::EntitySchema;
use crate::source::DatabaseConnection;
use crate::types::EntityKind;
use crate::validate::CanonicalRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where one entity kind is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTarget {
    /// Entity kind
    pub entity: EntityKind,
    /// Table name
    pub table: String,
    /// Upsert key columns
    pub key: Vec<String>,
    /// Columns with their SQL types, in record field order
    pub columns: Vec<(String, &'static str)>,
}

impl LoadTarget {
    /// Target of a compiled schema
    pub fn from_schema(schema: &EntitySchema) -> Self {
        Self {
            entity: schema.entity,
            table: schema.table.clone(),
            key: schema.key.clone(),
            columns: schema.columns(),
        }
    }
}

/// Typed failure of a batch commit; the batch is never partially committed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },
}

impl LoadError {
    /// Create a constraint violation
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::ConstraintViolation {
            message: message.into(),
        }
    }

    /// Create a connection loss
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }
}

/// Bulk writer of canonical records
#[async_trait]
pub trait Loader: Send + Sync {
    /// Make sure the target table exists
    async fn prepare(&self, target: &LoadTarget) -> Result<(), LoadError>;

    /// Commit one batch atomically, returning the committed row count
    async fn load_batch(
        &self,
        target: &LoadTarget,
        batch: &[CanonicalRecord],
    ) -> Result<usize, LoadError>;

    /// Human-readable destination
    fn describe(&self) -> String;
}

/// Warehouse settings of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// DuckDB database file; in-memory when absent
    #[serde(default)]
    pub path: Option<String>,
    /// PostgreSQL warehouse, attached through DuckDB
    #[serde(default)]
    pub postgres: Option<DatabaseConnection>,
    /// Connections held at once across all entity kinds
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_max_connections() -> usize {
    2
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            path: None,
            postgres: None,
            max_connections: default_max_connections(),
        }
    }
}

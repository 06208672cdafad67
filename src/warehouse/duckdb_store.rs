//! DuckDB warehouse
//!
//! Loads into a DuckDB file (or in-memory database), or into PostgreSQL
//! attached through DuckDB's `postgres` extension. Each batch is one
//! transaction on a cloned connection; a semaphore bounds how many clones
//! exist at once.

use super::types::{LoadError, LoadTarget, Loader, WarehouseConfig};
use crate::error::{Error, Result};
use crate::normalize::FieldValue;
use crate::source::DatabaseKind;
use crate::validate::CanonicalRecord;
use async_trait::async_trait;
use duckdb::Connection;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tracing::debug;

/// Catalog name of an attached PostgreSQL warehouse
const ATTACHED: &str = "warehouse";

/// DuckDB-backed loader
pub struct DuckDbWarehouse {
    conn: Arc<Mutex<Connection>>,
    permits: Arc<Semaphore>,
    attached: bool,
    location: String,
    #[cfg(test)]
    fail_at_row: Option<usize>,
}

impl DuckDbWarehouse {
    /// Open the warehouse described by a config
    pub fn open(config: &WarehouseConfig) -> Result<Self> {
        if config.max_connections == 0 {
            return Err(Error::invalid_value("max_connections", "must be at least 1"));
        }

        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        let mut location = config.path.clone().unwrap_or_else(|| ":memory:".to_string());
        let attached = match &config.postgres {
            Some(pg) => {
                if pg.engine != DatabaseKind::Postgres {
                    return Err(Error::invalid_value(
                        "warehouse.postgres.engine",
                        "must be postgres",
                    ));
                }
                conn.execute_batch("INSTALL postgres; LOAD postgres;")
                    .map_err(|e| Error::warehouse(format!("Failed to load postgres: {e}")))?;
                let conn_str = pg.connection_string().replace('\'', "''");
                let attach = format!("ATTACH '{conn_str}' AS {ATTACHED} (TYPE POSTGRES);");
                conn.execute_batch(&attach)
                    .map_err(|e| Error::warehouse(format!("Failed to attach warehouse: {e}")))?;
                location = pg.redacted();
                true
            }
            None => false,
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            permits: Arc::new(Semaphore::new(config.max_connections)),
            attached,
            location,
            #[cfg(test)]
            fail_at_row: None,
        })
    }

    /// In-memory warehouse
    pub fn in_memory() -> Result<Self> {
        Self::open(&WarehouseConfig::default())
    }

    /// Drop the connection while inserting row `row` of every batch
    #[cfg(test)]
    #[must_use]
    pub(crate) fn fail_at_row(mut self, row: usize) -> Self {
        self.fail_at_row = Some(row);
        self
    }

    /// Table name as seen from the DuckDB connection
    fn qualified(&self, table: &str) -> String {
        if self.attached {
            format!("{ATTACHED}.{}", quote(table))
        } else {
            quote(table)
        }
    }

    /// A scoped connection for one unit of work
    fn connection(&self) -> std::result::Result<Connection, LoadError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| LoadError::connection_lost("warehouse connection poisoned"))?;
        conn.try_clone().map_err(classify)
    }

    /// Rows currently in a table
    pub async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualified(table));
        let conn = self.connection().map_err(|e| Error::warehouse(e.to_string()))?;
        tokio::task::spawn_blocking(move || -> Result<u64> {
            let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| Error::warehouse(e.to_string()))?
    }

    /// Values of one column, ordered by it
    pub async fn column_values(&self, table: &str, column: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT CAST({col} AS VARCHAR) FROM {table} ORDER BY {col}",
            col = quote(column),
            table = self.qualified(table)
        );
        let conn = self.connection().map_err(|e| Error::warehouse(e.to_string()))?;
        tokio::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
            let mut values = Vec::new();
            for value in rows {
                values.push(value?.unwrap_or_default());
            }
            Ok(values)
        })
        .await
        .map_err(|e| Error::warehouse(e.to_string()))?
    }
}

impl std::fmt::Debug for DuckDbWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbWarehouse")
            .field("location", &self.location)
            .field("attached", &self.attached)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Loader for DuckDbWarehouse {
    async fn prepare(&self, target: &LoadTarget) -> std::result::Result<(), LoadError> {
        let sql = create_table_sql(&self.qualified(&target.table), target);
        debug!("Preparing {}: {}", target.table, sql);

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LoadError::connection_lost("warehouse closed"))?;
        let conn = self.connection()?;
        tokio::task::spawn_blocking(move || conn.execute_batch(&sql).map_err(classify))
            .await
            .map_err(|e| LoadError::connection_lost(e.to_string()))?
    }

    async fn load_batch(
        &self,
        target: &LoadTarget,
        batch: &[CanonicalRecord],
    ) -> std::result::Result<usize, LoadError> {
        if batch.is_empty() {
            return Ok(0);
        }

        let table = self.qualified(&target.table);
        let statements = if self.attached {
            // ON CONFLICT is not available on attached PostgreSQL tables
            vec![delete_by_key_sql(&table, &target.key), insert_sql(&table, target, false)]
        } else {
            vec![insert_sql(&table, target, true)]
        };
        let key_positions: Vec<usize> = target
            .key
            .iter()
            .filter_map(|k| target.columns.iter().position(|(name, _)| name == k))
            .collect();
        let rows: Vec<Vec<Option<String>>> = batch
            .iter()
            .map(|record| {
                target
                    .columns
                    .iter()
                    .map(|(name, _)| record.get(name).and_then(FieldValue::to_sql_text))
                    .collect()
            })
            .collect();

        #[cfg(test)]
        let fail_at_row = self.fail_at_row;
        #[cfg(not(test))]
        let fail_at_row = None;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| LoadError::connection_lost("warehouse closed"))?;
        let conn = self.connection()?;

        let committed = tokio::task::spawn_blocking(move || {
            commit_rows(conn, &statements, &key_positions, &rows, fail_at_row)
        })
        .await
        .map_err(|e| LoadError::connection_lost(e.to_string()))??;

        debug!("Committed {} rows to {}", committed, target.table);
        Ok(committed)
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

/// Insert every row inside one transaction; any failure rolls back the lot
fn commit_rows(
    mut conn: Connection,
    statements: &[String],
    key_positions: &[usize],
    rows: &[Vec<Option<String>>],
    fail_at_row: Option<usize>,
) -> std::result::Result<usize, LoadError> {
    let tx = conn.transaction().map_err(classify)?;
    {
        let (mut delete, insert) = match statements {
            [delete, insert] => (Some(tx.prepare(delete).map_err(classify)?), insert),
            [insert] => (None, insert),
            _ => return Err(LoadError::constraint("no insert statement")),
        };
        let mut insert = tx.prepare(insert).map_err(classify)?;

        for (i, row) in rows.iter().enumerate() {
            if fail_at_row == Some(i) {
                return Err(LoadError::connection_lost(format!(
                    "connection dropped at row {i}"
                )));
            }
            if let Some(ref mut delete) = delete {
                let key = key_positions.iter().map(|&p| &row[p]);
                delete.execute(duckdb::params_from_iter(key)).map_err(classify)?;
            }
            insert.execute(duckdb::params_from_iter(row.iter())).map_err(classify)?;
        }
    }
    tx.commit().map_err(classify)?;
    Ok(rows.len())
}

/// Message fragments of errors raised by the transport, not by the data
const CONNECTION_MARKERS: [&str; 8] = [
    "io error",
    "connection",
    "could not connect",
    "server closed",
    "broken pipe",
    "timed out",
    "network",
    "ssl",
];

/// Sort a DuckDB error into the loader's failure types
fn classify(e: duckdb::Error) -> LoadError {
    classify_message(e.to_string())
}

/// Transport failures are `ConnectionLost`; SQL, catalog and data errors are
/// rejected by the warehouse and count as `ConstraintViolation`
pub(crate) fn classify_message(message: String) -> LoadError {
    let lower = message.to_lowercase();
    if CONNECTION_MARKERS.iter().any(|marker| lower.contains(marker)) {
        LoadError::connection_lost(message)
    } else {
        LoadError::constraint(message)
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `CREATE TABLE IF NOT EXISTS` with the upsert key as primary key
pub(crate) fn create_table_sql(table: &str, target: &LoadTarget) -> String {
    let mut defs: Vec<String> = target
        .columns
        .iter()
        .map(|(name, ty)| format!("{} {ty}", quote(name)))
        .collect();
    if !target.key.is_empty() {
        let key: Vec<String> = target.key.iter().map(|k| quote(k)).collect();
        defs.push(format!("PRIMARY KEY ({})", key.join(", ")));
    }
    format!("CREATE TABLE IF NOT EXISTS {table} ({})", defs.join(", "))
}

/// Parameterized insert, optionally as an upsert on the key
pub(crate) fn insert_sql(table: &str, target: &LoadTarget, upsert: bool) -> String {
    let columns: Vec<String> = target.columns.iter().map(|(name, _)| quote(name)).collect();
    let values: Vec<String> = target
        .columns
        .iter()
        .map(|(_, ty)| format!("CAST(? AS {ty})"))
        .collect();
    let mut sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        values.join(", ")
    );

    if upsert && !target.key.is_empty() {
        let key: Vec<String> = target.key.iter().map(|k| quote(k)).collect();
        let updates: Vec<String> = target
            .columns
            .iter()
            .filter(|(name, _)| !target.key.contains(name))
            .map(|(name, _)| format!("{col} = EXCLUDED.{col}", col = quote(name)))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", key.join(", ")));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                key.join(", "),
                updates.join(", ")
            ));
        }
    }
    sql
}

fn delete_by_key_sql(table: &str, key: &[String]) -> String {
    let conditions: Vec<String> = key.iter().map(|k| format!("{} = ?", quote(k))).collect();
    format!("DELETE FROM {table} WHERE {}", conditions.join(" AND "))
}

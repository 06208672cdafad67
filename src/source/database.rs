//! Database table source
//!
//! Reads a table or query from PostgreSQL, MySQL, SQLite or a DuckDB file by
//! attaching it read-only to an in-memory DuckDB connection. Rows are streamed
//! through a bounded channel from a blocking task.

use super::file::{receiver_stream, CHANNEL_CAPACITY};
use super::types::{DatabaseConfig, RecordStream, SourceAdapter};
use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use crate::validate::RawRecord;
use async_trait::async_trait;
use duckdb::types::{TimeUnit, Value};
use duckdb::Connection;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Reads rows from an external database
#[derive(Debug, Clone)]
pub struct DatabaseSource {
    config: DatabaseConfig,
}

impl DatabaseSource {
    /// Create a database source
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        match (&config.table, &config.query) {
            (Some(_), Some(_)) => Err(Error::config(
                "database source takes a table or a query, not both",
            )),
            (None, None) => Err(Error::config("database source needs a table or a query")),
            _ => Ok(Self { config }),
        }
    }

    /// SQL statement run against the attached database
    pub fn select_sql(&self) -> String {
        match (&self.config.query, &self.config.table) {
            (Some(query), _) => query.clone(),
            (None, Some(table)) => format!("SELECT * FROM source_db.{table}"),
            (None, None) => String::new(),
        }
    }
}

/// Open an in-memory DuckDB connection with the source attached as `source_db`
fn attach(config: &DatabaseConfig) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;

    let kind = config.connection.engine;
    if let Some(ext) = kind.extension() {
        conn.execute_batch(&format!("INSTALL {ext}; LOAD {ext};"))
            .map_err(|e| Error::config(format!("Failed to load {ext} extension: {e}")))?;
    }

    let conn_str = config.connection.connection_string().replace('\'', "''");
    let sql = match kind.attach_type() {
        Some(ty) => format!("ATTACH '{conn_str}' AS source_db (TYPE {ty}, READ_ONLY);"),
        None => format!("ATTACH '{conn_str}' AS source_db (READ_ONLY);"),
    };
    conn.execute_batch(&sql)?;
    Ok(conn)
}

/// Run the query, sending one record per row until the receiver goes away
fn read_rows(
    conn: &Connection,
    sql: &str,
    ready: oneshot::Sender<Result<()>>,
    tx: &mpsc::Sender<Result<RawRecord>>,
) {
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = ready.send(Err(Error::config(format!("Failed to prepare query: {e}"))));
            return;
        }
    };
    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    let columns = rows.as_ref().map(|s| s.column_names()).unwrap_or_default();
    let _ = ready.send(Ok(()));

    let mut position = 0;
    loop {
        let item = match rows.next() {
            Ok(Some(row)) => {
                let record = row_record(&columns, position, |i| row.get::<_, Value>(i));
                position += 1;
                record
            }
            Ok(None) => return,
            Err(e) => Err(Error::decode(format!("Failed to read row {position}: {e}"))),
        };
        let failed = item.is_err();
        if tx.blocking_send(item).is_err() || failed {
            return;
        }
    }
}

/// Build one record from a row; a cell that cannot be read fails the row
fn row_record(
    columns: &[String],
    position: u64,
    cell: impl Fn(usize) -> duckdb::Result<Value>,
) -> Result<RawRecord> {
    let fields = columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            cell(i)
                .map(|value| (column.clone(), duckdb_value_to_json(value)))
                .map_err(|e| {
                    Error::decode(format!(
                        "Failed to read column '{column}' of row {position}: {e}"
                    ))
                })
        })
        .collect::<Result<JsonObject>>()?;
    Ok(RawRecord::new(position, fields))
}

#[async_trait]
impl SourceAdapter for DatabaseSource {
    fn describe(&self) -> String {
        let conn = self.config.connection.redacted();
        match &self.config.table {
            Some(table) => format!("{conn} ({table})"),
            None => format!("{conn} (query)"),
        }
    }

    async fn open(&self) -> Result<RecordStream> {
        let config = self.config.clone();
        let sql = self.select_sql();
        let name = self.describe();
        debug!("Reading {} with: {}", name, sql);

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || match attach(&config) {
            Ok(conn) => read_rows(&conn, &sql, ready_tx, &tx),
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(receiver_stream(rx)),
            Ok(Err(e)) => Err(Error::source_unavailable(name, e.to_string())),
            Err(_) => Err(Error::source_unavailable(name, "database reader stopped")),
        }
    }
}

/// Convert a DuckDB value into the untyped JSON the normalizer expects
pub(crate) fn duckdb_value_to_json(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(b),
        Value::TinyInt(i) => JsonValue::Number(i.into()),
        Value::SmallInt(i) => JsonValue::Number(i.into()),
        Value::Int(i) => JsonValue::Number(i.into()),
        Value::BigInt(i) => JsonValue::Number(i.into()),
        Value::HugeInt(i) => JsonValue::String(i.to_string()),
        Value::UTinyInt(i) => JsonValue::Number(i.into()),
        Value::USmallInt(i) => JsonValue::Number(i.into()),
        Value::UInt(i) => JsonValue::Number(i.into()),
        Value::UBigInt(i) => JsonValue::Number(i.into()),
        Value::Float(f) => {
            serde_json::Number::from_f64(f64::from(f)).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Double(f) => {
            serde_json::Number::from_f64(f).map_or(JsonValue::Null, JsonValue::Number)
        }
        Value::Decimal(d) => JsonValue::String(d.to_string()),
        Value::Text(s) => JsonValue::String(s),
        Value::Blob(b) => JsonValue::String(String::from_utf8_lossy(&b).into_owned()),
        Value::Timestamp(unit, value) => to_micros(unit, value)
            .and_then(chrono::DateTime::from_timestamp_micros)
            .map_or(JsonValue::Number(value.into()), |dt| {
                JsonValue::String(dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }),
        Value::Date32(days) => chrono::NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .map_or(JsonValue::Number(days.into()), |date| {
                JsonValue::String(date.format("%Y-%m-%d").to_string())
            }),
        Value::Time64(unit, value) => match to_micros(unit, value) {
            Some(micros) => {
                let secs = micros / 1_000_000;
                JsonValue::String(format!(
                    "{:02}:{:02}:{:02}",
                    secs / 3600,
                    (secs % 3600) / 60,
                    secs % 60
                ))
            }
            None => JsonValue::Number(value.into()),
        },
        other => JsonValue::String(format!("{other:?}")),
    }
}

fn to_micros(unit: TimeUnit, value: i64) -> Option<i64> {
    match unit {
        TimeUnit::Second => value.checked_mul(1_000_000),
        TimeUnit::Millisecond => value.checked_mul(1_000),
        TimeUnit::Microsecond => Some(value),
        TimeUnit::Nanosecond => Some(value / 1_000),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duckdb_value_to_json() {
        assert_eq!(duckdb_value_to_json(Value::Null), JsonValue::Null);
        assert_eq!(duckdb_value_to_json(Value::Int(42)), json!(42));
        assert_eq!(duckdb_value_to_json(Value::Text("GB".into())), json!("GB"));
        assert_eq!(duckdb_value_to_json(Value::Date32(0)), json!("1970-01-01"));
        assert_eq!(
            duckdb_value_to_json(Value::Time64(TimeUnit::Microsecond, 79_206_000_000)),
            json!("22:00:06")
        );
    }

    #[test]
    fn test_unreadable_cell_fails_row() {
        let columns = vec!["store_code".to_string(), "staff_numbers".to_string()];

        let record = row_record(&columns, 3, |i| Ok(Value::Int(i32::try_from(i).unwrap())))
            .unwrap();
        assert_eq!(record.position, 3);
        assert_eq!(record.get("staff_numbers"), Some(&json!(1)));

        let err = row_record(&columns, 4, |i| match i {
            0 => Ok(Value::Text("WEB-1388012W".into())),
            _ => Err(duckdb::Error::InvalidColumnIndex(i)),
        })
        .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("staff_numbers"));
    }

    #[test]
    fn test_time_units_are_honoured() {
        assert_eq!(
            duckdb_value_to_json(Value::Time64(TimeUnit::Second, 79_206)),
            json!("22:00:06")
        );
        assert_eq!(
            duckdb_value_to_json(Value::Time64(TimeUnit::Nanosecond, 79_206_000_000_000)),
            json!("22:00:06")
        );
        assert_eq!(
            duckdb_value_to_json(Value::Timestamp(TimeUnit::Millisecond, 1_349_647_206_000)),
            json!("2012-10-07 22:00:06")
        );
        assert_eq!(
            duckdb_value_to_json(Value::Timestamp(TimeUnit::Second, 1_349_647_206)),
            json!("2012-10-07 22:00:06")
        );
    }
}

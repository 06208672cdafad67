//! Tests for warehouse module

use super::duckdb_store::{classify_message, create_table_sql, insert_sql};
use super::*;
use crate::schema::SchemaRegistry;
use crate::types::EntityKind;
use crate::validate::{CanonicalRecord, RawRecord, Validator, Verdict};
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;
use uuid::Uuid;

fn date_times(n: usize, month: u32) -> (LoadTarget, Vec<CanonicalRecord>) {
    let schema = SchemaRegistry::builtin()
        .unwrap()
        .require(EntityKind::DateTime)
        .unwrap();
    let target = LoadTarget::from_schema(&schema);
    let validator = Validator::new(schema);

    let records = (0..n)
        .map(|i| {
            let raw = RawRecord::from_value(
                i as u64,
                json!({
                    "timestamp": "22:00:06",
                    "month": month.to_string(),
                    "year": "2012",
                    "day": "19",
                    "time_period": "Evening",
                    "date_uuid": Uuid::new_v4().to_string()
                }),
            );
            match validator.validate(raw) {
                Verdict::Accepted(record) => record,
                Verdict::Rejected(rejected) => panic!("fixture rejected: {rejected:?}"),
            }
        })
        .collect();
    (target, records)
}

// ============================================================================
// SQL Generation Tests
// ============================================================================

#[test]
fn test_create_table_sql() {
    let (target, _) = date_times(0, 9);
    let sql = create_table_sql("\"dim_date_times\"", &target);

    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"dim_date_times\" ("));
    assert!(sql.contains("\"timestamp\" TIME"));
    assert!(sql.contains("\"month\" BIGINT"));
    assert!(sql.contains("\"date_uuid\" UUID"));
    assert!(sql.ends_with("PRIMARY KEY (\"date_uuid\"))"));
}

#[test]
fn test_insert_sql_upsert() {
    let target = LoadTarget {
        entity: EntityKind::Order,
        table: "orders_table".to_string(),
        key: vec!["date_uuid".to_string(), "product_code".to_string()],
        columns: vec![
            ("date_uuid".to_string(), "UUID"),
            ("product_code".to_string(), "VARCHAR"),
            ("product_quantity".to_string(), "BIGINT"),
        ],
    };

    assert_eq!(
        insert_sql("\"orders_table\"", &target, true),
        "INSERT INTO \"orders_table\" (\"date_uuid\", \"product_code\", \"product_quantity\") \
         VALUES (CAST(? AS UUID), CAST(? AS VARCHAR), CAST(? AS BIGINT)) \
         ON CONFLICT (\"date_uuid\", \"product_code\") \
         DO UPDATE SET \"product_quantity\" = EXCLUDED.\"product_quantity\""
    );
    assert!(!insert_sql("t", &target, false).contains("ON CONFLICT"));
}

#[test]
fn test_warehouse_config_default() {
    let config: WarehouseConfig = serde_yaml::from_str("path: warehouse.duckdb").unwrap();
    assert_eq!(config.max_connections, 2);
    assert!(config.postgres.is_none());

    let zero = WarehouseConfig {
        max_connections: 0,
        ..WarehouseConfig::default()
    };
    assert!(DuckDbWarehouse::open(&zero).is_err());
}

// ============================================================================
// DuckDB Loader Tests
// ============================================================================

#[tokio::test]
async fn test_load_batch_commits_typed_rows() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    let (target, records) = date_times(5, 9);

    warehouse.prepare(&target).await.unwrap();
    assert_eq!(warehouse.load_batch(&target, &records).await.unwrap(), 5);
    assert_eq!(warehouse.count_rows("dim_date_times").await.unwrap(), 5);
    assert_eq!(
        warehouse.column_values("dim_date_times", "month").await.unwrap(),
        vec!["9"; 5]
    );
}

#[tokio::test]
async fn test_prepare_is_idempotent() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    let (target, _) = date_times(0, 9);
    warehouse.prepare(&target).await.unwrap();
    warehouse.prepare(&target).await.unwrap();
    assert_eq!(warehouse.count_rows("dim_date_times").await.unwrap(), 0);
}

#[tokio::test]
async fn test_reload_upserts_on_key() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    let (target, records) = date_times(3, 9);
    warehouse.prepare(&target).await.unwrap();
    warehouse.load_batch(&target, &records).await.unwrap();
    warehouse.load_batch(&target, &records[..1]).await.unwrap();

    assert_eq!(warehouse.count_rows("dim_date_times").await.unwrap(), 3);
}

#[tokio::test]
async fn test_connection_loss_rolls_back_whole_batch() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap().fail_at_row(60);
    let (target, records) = date_times(100, 9);
    warehouse.prepare(&target).await.unwrap();

    let err = warehouse.load_batch(&target, &records).await.unwrap_err();
    assert!(matches!(err, LoadError::ConnectionLost { .. }));
    assert_eq!(warehouse.count_rows("dim_date_times").await.unwrap(), 0);
}

#[tokio::test]
async fn test_constraint_violation_classified() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warehouse.duckdb");
    {
        let conn = duckdb::Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"CREATE TABLE dim_date_times (
                "timestamp" TIME, month BIGINT CHECK (month < 6), year BIGINT, day BIGINT,
                time_period VARCHAR, date_uuid UUID PRIMARY KEY)"#,
        )
        .unwrap();
    }

    let warehouse = DuckDbWarehouse::open(&WarehouseConfig {
        path: Some(path.to_string_lossy().into_owned()),
        ..WarehouseConfig::default()
    })
    .unwrap();
    let (target, mut records) = date_times(2, 3);
    records.extend(date_times(1, 9).1);
    warehouse.prepare(&target).await.unwrap();

    let err = warehouse.load_batch(&target, &records).await.unwrap_err();
    assert!(matches!(err, LoadError::ConstraintViolation { .. }), "{err:?}");
    assert_eq!(warehouse.count_rows("dim_date_times").await.unwrap(), 0);
}

#[tokio::test]
async fn test_missing_table_is_not_connection_loss() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    let (target, records) = date_times(2, 9);

    let err = warehouse.load_batch(&target, &records).await.unwrap_err();
    assert!(matches!(err, LoadError::ConstraintViolation { .. }), "{err:?}");
}

#[test_case("IO Error: Could not write file \"warehouse.duckdb\"", true ; "io")]
#[test_case("Connection Error: server closed the connection unexpectedly", true ; "postgres")]
#[test_case("Catalog Error: Table with name dim_users does not exist!", false ; "catalog")]
#[test_case("Parser Error: syntax error at or near \"FROM\"", false ; "parser")]
#[test_case("Conversion Error: Could not convert string to DECIMAL(12,2)", false ; "conversion")]
#[test_case("Constraint Error: Duplicate key \"date_uuid\"", false ; "duplicate key")]
fn test_classify_message(message: &str, connection: bool) {
    let err = classify_message(message.to_string());
    assert_eq!(matches!(err, LoadError::ConnectionLost { .. }), connection, "{err:?}");
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let warehouse = DuckDbWarehouse::in_memory().unwrap();
    let (target, _) = date_times(0, 9);
    assert_eq!(warehouse.load_batch(&target, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_discard_loader_counts() {
    let loader = DiscardLoader::new();
    let (target, records) = date_times(4, 9);
    loader.prepare(&target).await.unwrap();
    assert_eq!(loader.load_batch(&target, &records).await.unwrap(), 4);
    assert_eq!(loader.discarded(), 4);
}

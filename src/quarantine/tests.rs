//! Tests for quarantine module

use super::*;
use crate::types::EntityKind;
use crate::validate::{RawRecord, ReasonCode, RejectedRecord, Violation};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

fn rejected(position: u64, code: &str) -> RejectedRecord {
    let raw = RawRecord::from_value(position, json!({"country_code": code, "extra": [1, 2]}));
    RejectedRecord::new(
        EntityKind::User,
        raw,
        vec![
            Violation::new("country_code", ReasonCode::UnknownCode, format!("'{code}'")),
            Violation::new("user_uuid", ReasonCode::MissingValue, "null"),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_jsonl_writes_raw_fields_and_violations() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlQuarantine::new(dir.path().join("quarantine"));
    let run_id = Uuid::new_v4();

    let mut logger = store.open(EntityKind::User, "dim_users", run_id).await.unwrap();
    assert_eq!(logger.append(&[rejected(4, "XX"), rejected(9, "ZZ")]).await.unwrap(), 2);
    assert_eq!(logger.append(&[]).await.unwrap(), 0);
    logger.close().await.unwrap();

    assert_eq!(logger.written(), 2);
    assert!(logger.location().ends_with("dim_users.rejected.jsonl"));

    let entries = read_entries(store.path_for("dim_users")).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].run_id, run_id);
    assert_eq!(entries[0].entity, EntityKind::User);
    assert_eq!(entries[0].position, 4);
    assert_eq!(entries[0].raw["extra"], json!([1, 2]));
    assert_eq!(entries[1].raw["country_code"], json!("ZZ"));
    assert_eq!(
        entries[0]
            .violations
            .iter()
            .map(|v| (v.field.as_str(), v.reason))
            .collect::<Vec<_>>(),
        vec![
            ("country_code", ReasonCode::UnknownCode),
            ("user_uuid", ReasonCode::MissingValue)
        ]
    );
}

#[tokio::test]
async fn test_jsonl_appends_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlQuarantine::new(dir.path());

    for _ in 0..2 {
        let mut logger = store
            .open(EntityKind::User, "dim_users", Uuid::new_v4())
            .await
            .unwrap();
        logger.append(&[rejected(0, "XX")]).await.unwrap();
        logger.close().await.unwrap();
    }

    let entries = read_entries(store.path_for("dim_users")).unwrap();
    assert_eq!(entries.len(), 2);
    assert_ne!(entries[0].run_id, entries[1].run_id);
}

#[tokio::test]
async fn test_jsonl_line_format() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlQuarantine::new(dir.path());
    let mut logger = store
        .open(EntityKind::User, "dim_users", Uuid::nil())
        .await
        .unwrap();
    logger.append(&[rejected(1, "XX")]).await.unwrap();
    logger.close().await.unwrap();

    let body = std::fs::read_to_string(store.path_for("dim_users")).unwrap();
    let line: serde_json::Value = serde_json::from_str(body.lines().next().unwrap()).unwrap();
    assert_eq!(line["entity"], json!("user"));
    assert_eq!(line["violations"][0]["reason"], json!("UnknownCode"));
    assert_eq!(line["violations"][0]["field"], json!("country_code"));
}

#[tokio::test]
async fn test_closed_logger_refuses_appends() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonlQuarantine::new(dir.path());
    let mut logger = store
        .open(EntityKind::User, "dim_users", Uuid::nil())
        .await
        .unwrap();
    logger.close().await.unwrap();
    assert!(logger.append(&[rejected(0, "XX")]).await.is_err());
}

#[test]
fn test_read_entries_missing_file() {
    assert!(read_entries("/nonexistent/dim_users.rejected.jsonl").is_err());
}

#[tokio::test]
async fn test_memory_quarantine_shared_between_clones() {
    let store = MemoryQuarantine::new();
    let handle = store.clone();

    let mut logger = store
        .open(EntityKind::User, "dim_users", Uuid::nil())
        .await
        .unwrap();
    logger.append(&[rejected(0, "XX"), rejected(3, "YY")]).await.unwrap();

    assert_eq!(handle.len(), 2);
    assert_eq!(handle.entries_for(EntityKind::User)[1].position, 3);
    assert!(handle.entries_for(EntityKind::Order).is_empty());
    assert_eq!(logger.location(), "memory://dim_users");
}

#[tokio::test]
async fn test_unavailable_quarantine_fails_appends() {
    let store = MemoryQuarantine::unavailable();
    let mut logger = store
        .open(EntityKind::User, "dim_users", Uuid::nil())
        .await
        .unwrap();
    assert!(logger.append(&[rejected(0, "XX")]).await.is_err());
    assert!(store.is_empty());
}

#[test]
fn test_quarantine_config_default() {
    let config: QuarantineConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(config.dir, std::path::PathBuf::from("./quarantine"));
}

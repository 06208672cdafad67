//! Tests for partition module

use super::*;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::EntityKind;
use crate::validate::{RawRecord, Validator, Verdict};
use futures::stream::{self, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

fn schema() -> Arc<EntitySchema> {
    SchemaRegistry::builtin()
        .unwrap()
        .require(EntityKind::DateTime)
        .unwrap()
}

/// Verdicts for `months`; out-of-range months are rejected
fn verdicts(months: &[i64]) -> Vec<Verdict> {
    let validator = Validator::new(schema());
    months
        .iter()
        .enumerate()
        .map(|(i, month)| {
            validator.validate(RawRecord::from_value(
                i as u64,
                json!({
                    "timestamp": "10:00:00",
                    "month": month,
                    "year": 2020,
                    "day": 1,
                    "time_period": "Morning",
                    "date_uuid": format!("00000000-0000-4000-8000-{i:012}")
                }),
            ))
        })
        .collect()
}

fn positions(batch: &PartitionedBatch) -> (Vec<u64>, Vec<u64>) {
    (
        batch.accepted.iter().map(|r| r.position()).collect(),
        batch.rejected.iter().map(|r| r.raw().position).collect(),
    )
}

// ============================================================================
// PartitionedBatch Tests
// ============================================================================

#[test]
fn test_order_is_preserved() {
    let batch = PartitionedBatch::from_verdicts(verdicts(&[1, 13, 3]));

    assert_eq!(positions(&batch), (vec![0, 2], vec![1]));
    assert_eq!(
        batch.rejected[0].violations()[0].field,
        "month".to_string()
    );
    assert_eq!(batch.len(), 3);
}

#[test]
fn test_empty_batch() {
    let batch = PartitionedBatch::new();
    assert!(batch.is_empty());
    let (accepted, rejected) = batch.into_parts();
    assert!(accepted.is_empty() && rejected.is_empty());
}

// ============================================================================
// Partitioner Tests
// ============================================================================

#[test]
fn test_batches_are_bounded() {
    let batches: Vec<_> = partition(verdicts(&[1, 2, 13, 4, 14, 6, 7]), 3).collect();

    assert_eq!(batches.len(), 3);
    assert_eq!(
        batches.iter().map(PartitionedBatch::len).collect::<Vec<_>>(),
        vec![3, 3, 1]
    );
    assert_eq!(positions(&batches[0]), (vec![0, 1], vec![2]));
    assert_eq!(positions(&batches[1]), (vec![3, 5], vec![4]));
    assert_eq!(positions(&batches[2]), (vec![6], vec![]));
}

#[test]
fn test_empty_input_yields_no_batches() {
    assert_eq!(partition(Vec::new(), 10).count(), 0);
}

#[test]
fn test_zero_batch_size_is_one() {
    assert_eq!(partition(verdicts(&[1, 2]), 0).count(), 2);
}

#[test]
fn test_partitioner_is_lazy() {
    let mut consumed = 0;
    let source = verdicts(&[1, 2, 3, 4, 5, 6]).into_iter().inspect(|_| consumed += 1);
    let first = Partitioner::new(source, 2).next();

    assert_eq!(first.map(|b| b.len()), Some(2));
    assert_eq!(consumed, 2);
}

// ============================================================================
// Stream Tests
// ============================================================================

#[tokio::test]
async fn test_stream_batches() {
    let input = stream::iter(verdicts(&[1, 13, 3, 4]).into_iter().map(Ok::<_, String>));
    let batches: Vec<_> = partition_stream(input, 2).collect().await;

    assert_eq!(batches.len(), 2);
    let first = batches[0].as_ref().unwrap();
    assert_eq!(positions(first), (vec![0], vec![1]));
    let second = batches[1].as_ref().unwrap();
    assert_eq!(positions(second), (vec![2, 3], vec![]));
}

#[tokio::test]
async fn test_stream_error_flushes_buffered_batch() {
    let mut items: Vec<Result<Verdict, String>> =
        verdicts(&[1, 2, 3]).into_iter().map(Ok).collect();
    items.insert(2, Err("source lost".to_string()));

    let batches: Vec<_> = partition_stream(stream::iter(items), 10).collect().await;

    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].as_ref().map(PartitionedBatch::len), Ok(2));
    assert_eq!(batches[1].as_ref().unwrap_err(), "source lost");
}

#[tokio::test]
async fn test_stream_error_first() {
    let input = stream::iter(vec![Err::<Verdict, _>("down".to_string())]);
    let batches: Vec<_> = partition_stream(input, 10).collect().await;

    assert_eq!(batches.len(), 1);
    assert!(batches[0].is_err());
}

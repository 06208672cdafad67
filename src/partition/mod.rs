//! Verdict partitioning
//!
//! Splits the verdicts of one entity kind into an accepted stream and a
//! rejected stream, one bounded batch at a time.
//!
//! # Overview
//!
//! Each [`PartitionedBatch`] holds the accepted canonical records and the
//! rejected records of at most `batch_size` consecutive verdicts. Both
//! halves keep source order. Nothing is reordered or deduplicated; the
//! loader and the quarantine logger own any such policy.
//!
//! - [`partition`] works over any iterator of verdicts
//! - [`partition_stream`] works over a fallible async stream and is what the
//!   pipeline drives

mod partitioner;
mod types;

pub use partitioner::{partition, partition_stream, Partitioner};
pub use types::PartitionedBatch;

#[cfg(test)]
mod tests;

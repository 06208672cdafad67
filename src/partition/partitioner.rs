//! Batching partitioners

use super::types::PartitionedBatch;
use crate::validate::Verdict;
use futures::stream::{self, Stream, StreamExt};

// ============================================================================
// Iterator
// ============================================================================

/// Lazily partitions an iterator of verdicts into bounded batches
#[derive(Debug)]
pub struct Partitioner<I> {
    verdicts: I,
    batch_size: usize,
}

impl<I> Partitioner<I> {
    /// Create a partitioner; a zero batch size is treated as one
    pub fn new(verdicts: I, batch_size: usize) -> Self {
        Self {
            verdicts,
            batch_size: batch_size.max(1),
        }
    }
}

impl<I: Iterator<Item = Verdict>> Iterator for Partitioner<I> {
    type Item = PartitionedBatch;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = PartitionedBatch::from_verdicts(self.verdicts.by_ref().take(self.batch_size));
        (!batch.is_empty()).then_some(batch)
    }
}

/// Partition verdicts into batches of at most `batch_size`
pub fn partition<I>(verdicts: I, batch_size: usize) -> Partitioner<I::IntoIter>
where
    I: IntoIterator<Item = Verdict>,
{
    Partitioner::new(verdicts.into_iter(), batch_size)
}

// ============================================================================
// Stream
// ============================================================================

struct StreamState<S, E> {
    verdicts: S,
    pending: Option<E>,
    exhausted: bool,
}

/// Partition a fallible verdict stream into batches of at most `batch_size`
///
/// A stream error first flushes the verdicts already buffered as a batch,
/// then is yielded on its own. The stream ends after an error.
pub fn partition_stream<S, E>(
    verdicts: S,
    batch_size: usize,
) -> impl Stream<Item = Result<PartitionedBatch, E>>
where
    S: Stream<Item = Result<Verdict, E>> + Unpin,
{
    let batch_size = batch_size.max(1);
    let state = StreamState {
        verdicts,
        pending: None,
        exhausted: false,
    };

    stream::unfold(state, move |mut state| async move {
        if let Some(err) = state.pending.take() {
            state.exhausted = true;
            return Some((Err(err), state));
        }
        if state.exhausted {
            return None;
        }

        let mut batch = PartitionedBatch::new();
        while batch.len() < batch_size {
            match state.verdicts.next().await {
                Some(Ok(verdict)) => batch.push(verdict),
                Some(Err(err)) => {
                    state.pending = Some(err);
                    break;
                }
                None => {
                    state.exhausted = true;
                    break;
                }
            }
        }

        if !batch.is_empty() {
            Some((Ok(batch), state))
        } else if let Some(err) = state.pending.take() {
            state.exhausted = true;
            Some((Err(err), state))
        } else {
            None
        }
    })
}

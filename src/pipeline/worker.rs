//! Worker stage
//!
//! Workers are competing consumers of the distribution queue. Each one owns a
//! single [`PartialAggregate`] and hands it to the merger exactly once, when
//! the queue is drained or cancellation is observed.

use super::cancellation::CancellationController;
use super::reader::Batch;
use crate::aggregate::PartialAggregate;
use crate::extract::{extract, FirstNamePolicy};
use async_channel::Receiver;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// What a worker hands to the merger when it stops
#[derive(Debug)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub partial: PartialAggregate,
    pub batches_processed: u64,
    /// The worker stopped because of cancellation, not end of input
    pub cancelled: bool,
}

pub struct Worker {
    id: usize,
    queue: Receiver<Batch>,
    reports: mpsc::Sender<WorkerReport>,
    cancellation: CancellationController,
    policy: FirstNamePolicy,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: Receiver<Batch>,
        reports: mpsc::Sender<WorkerReport>,
        cancellation: CancellationController,
        policy: FirstNamePolicy,
    ) -> Self {
        Self {
            id,
            queue,
            reports,
            cancellation,
            policy,
        }
    }

    pub async fn run(self) {
        let mut partial = PartialAggregate::new();
        let mut batches_processed = 0;
        let mut cancelled = false;

        loop {
            let batch = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    cancelled = true;
                    break;
                }
                next = self.queue.recv() => match next {
                    Ok(batch) => batch,
                    // Closed and drained
                    Err(_) => break,
                },
            };

            if !self.fold_batch(&mut partial, &batch) {
                cancelled = true;
                break;
            }
            batches_processed += 1;

            // Folding is CPU bound; let the reader and other workers in
            tokio::task::yield_now().await;
        }

        debug!(
            worker = self.id,
            batches = batches_processed,
            records = partial.record_count,
            malformed = partial.malformed_records,
            cancelled,
            "Worker finished"
        );

        let report = WorkerReport {
            worker_id: self.id,
            partial,
            batches_processed,
            cancelled,
        };

        if self.reports.send(report).await.is_err() {
            debug!(worker = self.id, "Merger stopped before report was delivered");
        }
    }

    /// Returns false if cancellation interrupted the batch
    fn fold_batch(&self, partial: &mut PartialAggregate, batch: &Batch) -> bool {
        for (seq, record) in batch.sequenced() {
            if self.cancellation.is_cancelled() {
                return false;
            }

            match extract(record, self.policy) {
                Ok(fields) => partial.observe(seq, fields),
                Err(e) => {
                    trace!(worker = self.id, seq, error = %e, "Skipping malformed record");
                    partial.record_malformed();
                }
            }
        }
        true
    }
}

//! Merger stage
//!
//! Waits for one report per worker, or for cancellation, and folds the
//! partials together with [`PartialAggregate::merge`]. After cancellation it
//! still folds reports that arrive within [`CANCEL_DRAIN_GRACE`].

use super::cancellation::CancellationController;
use super::worker::WorkerReport;
use crate::aggregate::PartialAggregate;
use crate::error::{Result, TallyError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// How long a cancelled merge keeps collecting reports from stopping workers
pub const CANCEL_DRAIN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug)]
pub struct MergeOutcome {
    pub merged: PartialAggregate,
    pub reports_received: usize,
    pub cancelled: bool,
}

pub struct Merger {
    expected: usize,
    reports: mpsc::Receiver<WorkerReport>,
    cancellation: CancellationController,
}

impl Merger {
    pub fn new(
        expected: usize,
        reports: mpsc::Receiver<WorkerReport>,
        cancellation: CancellationController,
    ) -> Self {
        Self {
            expected,
            reports,
            cancellation,
        }
    }

    pub async fn run(mut self) -> Result<MergeOutcome> {
        let mut merged = PartialAggregate::new();
        let mut received = 0;
        let mut cancelled = false;

        while received < self.expected {
            tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    cancelled = true;
                    break;
                }
                report = self.reports.recv() => {
                    let Some(report) = report else {
                        // Every sender is gone but some workers never reported
                        return Err(TallyError::WorkerFailed {
                            expected: self.expected,
                            received,
                        });
                    };

                    debug!(
                        worker = report.worker_id,
                        records = report.partial.record_count,
                        "Merging partial aggregate"
                    );
                    cancelled |= report.cancelled;
                    merged = merged.merge(report.partial);
                    received += 1;
                }
            }
        }

        if cancelled && received < self.expected {
            let drain = self.drain_late_reports(&mut merged, &mut received);
            if tokio::time::timeout(CANCEL_DRAIN_GRACE, drain).await.is_err() {
                debug!(received, "Stopped waiting for late worker reports");
            }
        }

        Ok(MergeOutcome {
            merged,
            reports_received: received,
            cancelled,
        })
    }

    /// Fold reports from workers that are still winding down after cancellation
    async fn drain_late_reports(&mut self, merged: &mut PartialAggregate, received: &mut usize) {
        while *received < self.expected {
            let Some(report) = self.reports.recv().await else {
                break;
            };
            debug!(
                worker = report.worker_id,
                records = report.partial.record_count,
                "Merging late partial aggregate"
            );
            *merged = std::mem::take(merged).merge(report.partial);
            *received += 1;
        }
    }
}

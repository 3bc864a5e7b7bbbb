//! Concurrent tally pipeline
//!
//! ```text
//! SourceReader ──bounded queue──▶ Worker × N ──reports──▶ Merger ──▶ FinalAggregate
//! ```
//!
//! Stages only talk through channels. The distribution queue is a bounded
//! multi-consumer channel so a slow worker pool applies backpressure to the
//! reader. Every stage watches the same [`CancellationController`], so a
//! cancelled run returns promptly with [`RunStatus::Cancelled`].

pub mod cancellation;
pub mod merger;
pub mod phase;
pub mod reader;
pub mod worker;

pub use cancellation::CancellationController;
pub use phase::{PhaseTracker, PhaseTransition, RunPhase};
pub use reader::Batch;

use crate::aggregate::{FinalAggregate, RunStatus};
use crate::config::PipelineConfig;
use crate::error::Result;
use merger::Merger;
use reader::SourceReader;
use std::time::Instant;
use tokio::io::AsyncBufRead;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use worker::Worker;

/// Configured concurrent runner
///
/// Cancelling through [`Pipeline::cancellation`] affects the run in progress
/// and every later run on the same pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    cancellation: CancellationController,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancellation: CancellationController::new(),
        })
    }

    /// Use an externally owned cancellation signal
    pub fn with_cancellation(mut self, cancellation: CancellationController) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation(&self) -> CancellationController {
        self.cancellation.clone()
    }

    /// Run the reader, the worker pool and the merger over `source`
    pub async fn run<R>(&self, source: R) -> Result<FinalAggregate>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let started = Instant::now();
        let worker_count = self.config.worker_count;
        // Internal failures cancel this scope without touching the caller's signal
        let scope = self.cancellation.child();
        let mut phase = PhaseTracker::new();

        phase.advance(PhaseTransition::Start)?;
        info!(
            workers = worker_count,
            batch_size = self.config.batch_size,
            queue_capacity = self.config.effective_queue_capacity(),
            "Starting concurrent run"
        );

        let (batch_tx, batch_rx) = async_channel::bounded(self.config.effective_queue_capacity());
        let (report_tx, report_rx) = mpsc::channel(worker_count);

        let reader = tokio::spawn(
            SourceReader::new(source, self.config.batch_size, batch_tx, scope.clone()).run(),
        );

        let workers: Vec<JoinHandle<()>> = (0..worker_count)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    batch_rx.clone(),
                    report_tx.clone(),
                    scope.clone(),
                    self.config.first_name_policy,
                );
                tokio::spawn(worker.run())
            })
            .collect();
        drop(batch_rx);
        drop(report_tx);

        let merger = tokio::spawn(Merger::new(worker_count, report_rx, scope.clone()).run());

        let summary = match reader.await? {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "Reader failed, stopping run");
                scope.cancel();
                // Both exit promptly once the scope is cancelled
                let _ = merger.await;
                join_workers(workers).await?;
                return Err(e);
            }
        };

        if summary.cancelled {
            phase.advance(PhaseTransition::Cancel)?;
        } else {
            phase.advance(PhaseTransition::InputDrained)?;
        }

        let outcome = merger.await??;
        join_workers(workers).await?;

        let status = if summary.cancelled || outcome.cancelled {
            if phase.phase() != RunPhase::Cancelling {
                phase.advance(PhaseTransition::Cancel)?;
            }
            RunStatus::Cancelled
        } else {
            RunStatus::Complete
        };
        phase.advance(PhaseTransition::Finish)?;

        let result = outcome.merged.finalize(status);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.is_complete() {
            info!(
                records = result.total_records,
                malformed = result.malformed_records,
                people = result.distinct_people_count,
                elapsed_ms,
                "Concurrent run complete"
            );
        } else {
            warn!(
                records = result.total_records,
                reports = outcome.reports_received,
                elapsed_ms,
                "Concurrent run cancelled, result is partial"
            );
        }

        Ok(result)
    }
}

async fn join_workers(workers: Vec<JoinHandle<()>>) -> Result<()> {
    for handle in workers {
        handle.await?;
    }
    Ok(())
}

/// Run the concurrent pipeline with default settings apart from the pool shape
///
/// `worker_count` and `batch_size` must both be at least 1.
pub async fn run_concurrent<R>(
    source: R,
    worker_count: usize,
    batch_size: usize,
) -> Result<FinalAggregate>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    Pipeline::new(PipelineConfig::new(worker_count, batch_size))?
        .run(source)
        .await
}

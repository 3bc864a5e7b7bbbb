//! Cancellation of in-flight runs

mod common;

use anyhow::Result;
use common::{record, sample_records, source};
use donor_tally::{CancellationController, Pipeline, PipelineConfig, RunStatus};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::time::{sleep, timeout};

const BUDGET: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_cancel_while_reader_waits_for_input() -> Result<()> {
    let (mut writer, reader) = tokio::io::duplex(64 * 1024);
    for i in 0..50 {
        let line = record(&format!("DOE, JOHN{i}"), "01152023");
        writer.write_all(format!("{line}\n").as_bytes()).await?;
    }

    let pipeline = Pipeline::new(PipelineConfig::new(3, 10))?;
    let cancellation = pipeline.cancellation();
    let run = tokio::spawn(async move { pipeline.run(BufReader::new(reader)).await });

    // The writer stays open so the reader never sees end of input
    sleep(Duration::from_millis(100)).await;
    cancellation.cancel();

    let result = timeout(BUDGET, run).await???;
    assert_eq!(result.status, RunStatus::Cancelled);
    // Every published batch was folded before the signal, and those partials are kept
    assert_eq!(result.total_records, 50);
    assert_eq!(result.month_total(), result.total_records);
    assert_eq!(result.distinct_people_count, 50);

    drop(writer);
    Ok(())
}

#[tokio::test]
async fn test_cancel_with_full_queue() -> Result<()> {
    let records = sample_records(20_000);
    let pipeline = Pipeline::new(PipelineConfig::new(1, 1).with_queue_capacity(1))?;
    let cancellation = pipeline.cancellation();

    let run = tokio::spawn(async move { pipeline.run(source(&records)).await });
    tokio::task::yield_now().await;
    cancellation.cancel();

    let result = timeout(BUDGET, run).await???;
    // The run may have finished before the signal landed
    if result.status == RunStatus::Cancelled {
        assert!(result.total_records + result.malformed_records <= 20_000);
    } else {
        assert_eq!(result.total_records + result.malformed_records, 20_000);
    }
    Ok(())
}

#[tokio::test]
async fn test_pre_cancelled_external_signal() -> Result<()> {
    let external = CancellationController::new();
    external.cancel();

    let pipeline =
        Pipeline::new(PipelineConfig::new(4, 2))?.with_cancellation(external.clone());
    let result = timeout(BUDGET, pipeline.run(source(&sample_records(100)))).await??;

    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.total_records < 100);
    Ok(())
}

#[tokio::test]
async fn test_cancelling_child_leaves_parent_running() -> Result<()> {
    let parent = CancellationController::new();
    let child = parent.child();
    child.cancel();

    let pipeline = Pipeline::new(PipelineConfig::new(2, 8))?.with_cancellation(parent.clone());
    let result = pipeline.run(source(&sample_records(64))).await?;

    assert!(!parent.is_cancelled());
    assert_eq!(result.status, RunStatus::Complete);
    Ok(())
}

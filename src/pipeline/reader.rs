//! Source reader stage
//!
//! Reads the input sequentially, numbers every line and publishes fixed-size
//! batches to the bounded distribution queue. A full queue stalls the reader;
//! cancellation is raced against both reading and publishing so the reader
//! never stays blocked once the run is cancelled.

use super::cancellation::CancellationController;
use crate::error::{Result, TallyError};
use crate::source::RecordReader;
use async_channel::Sender;
use tokio::io::AsyncBufRead;
use tracing::{debug, info};

/// Contiguous run of records; record `i` has sequence number `first_seq + i`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub first_seq: u64,
    pub records: Vec<String>,
}

impl Batch {
    pub fn new(first_seq: u64, records: Vec<String>) -> Self {
        Self { first_seq, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records paired with their canonical sequence numbers
    pub fn sequenced(&self) -> impl Iterator<Item = (u64, &str)> {
        (self.first_seq..).zip(self.records.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSummary {
    pub records_read: u64,
    pub batches_published: u64,
    pub cancelled: bool,
}

pub struct SourceReader<R> {
    records: RecordReader<R>,
    batch_size: usize,
    queue: Sender<Batch>,
    cancellation: CancellationController,
}

impl<R> SourceReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(
        source: R,
        batch_size: usize,
        queue: Sender<Batch>,
        cancellation: CancellationController,
    ) -> Self {
        Self {
            records: RecordReader::new(source),
            batch_size: batch_size.max(1),
            queue,
            cancellation,
        }
    }

    /// Read the whole source, then close the queue
    ///
    /// The queue is closed on every exit path, so workers always observe the
    /// end of input. The input handle is released when this returns.
    pub async fn run(mut self) -> Result<ReaderSummary> {
        let outcome = self.read_all().await;
        self.queue.close();

        if let Ok(summary) = &outcome {
            info!(
                records = summary.records_read,
                batches = summary.batches_published,
                cancelled = summary.cancelled,
                "Reader finished"
            );
        }
        outcome
    }

    async fn read_all(&mut self) -> Result<ReaderSummary> {
        let mut summary = ReaderSummary {
            records_read: 0,
            batches_published: 0,
            cancelled: false,
        };
        let mut pending = Vec::with_capacity(self.batch_size);
        let mut first_seq = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancellation.cancelled() => {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                next = self.records.next_record() => next.map_err(TallyError::SourceRead)?,
            };

            let Some(record) = next else {
                break;
            };

            pending.push(record);
            summary.records_read += 1;

            if pending.len() == self.batch_size {
                let records = std::mem::replace(&mut pending, Vec::with_capacity(self.batch_size));
                if !self.publish(Batch::new(first_seq, records)).await {
                    summary.cancelled = true;
                    return Ok(summary);
                }
                summary.batches_published += 1;
                first_seq = summary.records_read;
            }
        }

        if !pending.is_empty() {
            if !self.publish(Batch::new(first_seq, pending)).await {
                summary.cancelled = true;
                return Ok(summary);
            }
            summary.batches_published += 1;
        }

        Ok(summary)
    }

    /// Returns false when the batch could not be delivered
    async fn publish(&mut self, batch: Batch) -> bool {
        if self.cancellation.is_cancelled() {
            return false;
        }

        let first_seq = batch.first_seq;
        let len = batch.len();

        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => false,
            sent = self.queue.send(batch) => match sent {
                Ok(()) => {
                    debug!(first_seq, len, "Published batch");
                    true
                }
                Err(_) => {
                    debug!(first_seq, "Distribution queue closed before publish");
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn lines(n: usize) -> Cursor<Vec<u8>> {
        let text: String = (0..n).map(|i| format!("record-{i}\n")).collect();
        Cursor::new(text.into_bytes())
    }

    #[tokio::test]
    async fn test_batches_carry_sequence_numbers() {
        let (tx, rx) = async_channel::bounded(16);
        let reader = SourceReader::new(lines(7), 3, tx, CancellationController::new());

        let summary = reader.run().await.unwrap();
        assert_eq!(summary.records_read, 7);
        assert_eq!(summary.batches_published, 3);
        assert!(!summary.cancelled);

        let mut batches = Vec::new();
        while let Ok(batch) = rx.recv().await {
            batches.push(batch);
        }
        assert_eq!(
            batches.iter().map(|b| (b.first_seq, b.len())).collect::<Vec<_>>(),
            vec![(0, 3), (3, 3), (6, 1)]
        );

        let seqs: Vec<(u64, &str)> = batches[1].sequenced().collect();
        assert_eq!(seqs, vec![(3, "record-3"), (4, "record-4"), (5, "record-5")]);
    }

    #[tokio::test]
    async fn test_empty_source_publishes_nothing() {
        let (tx, rx) = async_channel::bounded(1);
        let reader = SourceReader::new(lines(0), 3, tx, CancellationController::new());

        let summary = reader.run().await.unwrap();
        assert_eq!(summary.batches_published, 0);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_full_queue_stalls_until_cancelled() {
        let (tx, rx) = async_channel::bounded(1);
        let cancellation = CancellationController::new();
        let reader = SourceReader::new(lines(100), 10, tx, cancellation.clone());
        let handle = tokio::spawn(reader.run());

        // Nobody consumes, so only one batch fits
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(rx.len(), 1);

        cancellation.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("reader should stop after cancellation")
            .unwrap()
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.batches_published, 1);
        assert!(rx.is_closed());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (tx, rx) = async_channel::bounded(4);
        let cancellation = CancellationController::new();
        cancellation.cancel();

        let summary = SourceReader::new(lines(5), 2, tx, cancellation)
            .run()
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.records_read, 0);
        assert!(rx.recv().await.is_err());
    }
}

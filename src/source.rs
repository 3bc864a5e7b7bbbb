//! Input sources
//!
//! Any `AsyncBufRead` can feed a run. [`open_source`] opens a file on disk and
//! maps failure to [`TallyError::SourceUnavailable`] before any stage starts.

use crate::error::{Result, TallyError};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

const READ_BUFFER_CAPACITY: usize = 256 * 1024;

/// Open a record file for reading
pub async fn open_source(path: impl AsRef<Path>) -> Result<BufReader<File>> {
    let path = path.as_ref();
    let file = File::open(path)
        .await
        .map_err(|source| TallyError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(BufReader::with_capacity(READ_BUFFER_CAPACITY, file))
}

/// Line-by-line record reader
///
/// Lines end at `\n` with an optional `\r` before it. Bytes that are not
/// valid UTF-8 are replaced rather than failing the whole run.
pub struct RecordReader<R> {
    inner: R,
    buf: Vec<u8>,
}

impl<R> RecordReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(512),
        }
    }

    /// Read the next record, or `None` at end of input
    pub async fn next_record(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
            if self.buf.last() == Some(&b'\r') {
                self.buf.pop();
            }
        }

        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

//! Read progress reporting.

use std::io::{self, Read};

use tracing::{debug, info};

/// Wraps a reader and logs how many bytes have been consumed.
#[derive(Debug)]
pub struct ProgressReader<R> {
    inner: R,
    label: String,
    total: u64,
    read: u64,
}

impl<R: Read> ProgressReader<R> {
    /// Wrap `inner`, expecting `total` bytes.
    pub fn new(inner: R, label: impl Into<String>, total: u64) -> Self {
        Self {
            inner,
            label: label.into(),
            total,
            read: 0,
        }
    }

    /// Bytes consumed so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.read += n as u64;
            debug!(part = %self.label, read = self.read, total = self.total, "Reading upload");
            if self.read >= self.total {
                info!(part = %self.label, bytes = self.read, "Upload read complete");
            }
        }
        Ok(n)
    }
}

//! Performance utilities: parallel record decoding and write-buffer
//! batching.
//!
//! # Parallel decoding
//!
//! Framing a container is sequential (each header says where the next one
//! starts), but once the frames are in memory every record decodes
//! independently.  [`decode_frames_parallel`] decodes an ordered frame list
//! with Rayon when the `parallel` feature is enabled and sequentially
//! otherwise.  Output order always equals input order, and the first error
//! in container order is the one returned.
//!
//! # Write buffer
//!
//! [`WriteBuffer`] accumulates small writes and flushes to the underlying
//! writer in large chunks.  Sanitized output is a stream of 20-byte headers
//! interleaved with payloads, which otherwise means two `write` calls per
//! record.

use std::io::{self, Write};

use crate::error::Result;
use crate::record::{decode_frame, RawFrame, Record};

/// Default [`WriteBuffer`] capacity: 1 MiB.
pub const DEFAULT_WRITE_BUFFER: usize = 1024 * 1024;

// ── Parallel decoding ─────────────────────────────────────────────────────────

/// Decode `frames` into records, preserving order.
pub fn decode_frames_parallel(frames: &[RawFrame]) -> Result<Vec<Record>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        let results: Vec<Result<Record>> = frames.par_iter().map(decode_frame).collect();

        // Surface the first error if any.
        let mut out = Vec::with_capacity(frames.len());
        for r in results {
            out.push(r?);
        }
        Ok(out)
    }

    #[cfg(not(feature = "parallel"))]
    {
        frames.iter().map(decode_frame).collect()
    }
}

// ── Write buffer ─────────────────────────────────────────────────────────────

/// Buffered writer with configurable flush threshold.
///
/// Unlike `std::io::BufWriter`, this counts `bytes_written`; sanitize
/// refuses to publish output whose count differs from the input length.
pub struct WriteBuffer<W: Write> {
    inner:     W,
    buf:       Vec<u8>,
    capacity:  usize,
    pub bytes_written: u64,
}

impl<W: Write> WriteBuffer<W> {
    pub fn new(inner: W, capacity: usize) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            capacity,
            bytes_written: 0,
        }
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn flush_if_full(&mut self) -> io::Result<()> {
        if self.buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl<W: Write> Write for WriteBuffer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Large writes bypass the buffer.
        if buf.len() >= self.capacity {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
            self.inner.write_all(buf)?;
        } else {
            self.buf.extend_from_slice(buf);
            self.flush_if_full()?;
        }
        self.bytes_written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.inner.write_all(&self.buf)?;
            self.buf.clear();
        }
        self.inner.flush()
    }
}

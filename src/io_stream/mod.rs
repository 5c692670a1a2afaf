//! Streaming container reader and writer.
//!
//! # Reader
//! [`ImgCacheReader`] verifies the magic, then yields one [`RawFrame`] per
//! record in container order.  There is no record count or footer: the
//! sequence ends only when the stream position lands exactly on the end of
//! the file.  A header or payload that runs past the end is a fatal error
//! and fuses the iterator.
//!
//! [`ImgCacheReader::records`] layers decoding on top, turning each frame
//! into a [`Record`].
//!
//! # Writer
//! [`ImgCacheWriter`] writes the magic on construction and appends frames
//! verbatim.  It never patches earlier bytes, so a plain `Write` suffices.
//!
//! # Endianness
//! All header fields are little-endian; see `record.rs`.

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::container::{read_magic, write_magic, MAGIC_SIZE};
use crate::error::{Error, Result};
use crate::record::{decode_frame, RawFrame, Record, RecordHeader, RECORD_HEADER_SIZE};

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct ImgCacheReader<R: Read + Seek> {
    reader:         R,
    file_size:      u64,
    position:       u64,
    bytes_consumed: u64,
    frames_read:    u64,
    done:           bool,
}

impl<R: Read + Seek> ImgCacheReader<R> {
    /// Open a container.  The stream is rewound and its length measured
    /// first; fails with `InvalidContainer` if the magic does not match.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        read_magic(&mut reader)?;
        Ok(Self {
            reader,
            file_size,
            position:       MAGIC_SIZE as u64,
            bytes_consumed: MAGIC_SIZE as u64,
            frames_read:    0,
            done:           false,
        })
    }

    pub fn file_size(&self) -> u64 { self.file_size }

    /// Magic plus every frame read so far.
    pub fn bytes_consumed(&self) -> u64 { self.bytes_consumed }

    pub fn frames_read(&self) -> u64 { self.frames_read }

    /// Read the frame at the current position, or `None` at end of file.
    pub fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        let offset = self.position;
        if offset == self.file_size {
            return Ok(None);
        }
        let remaining = self.file_size.saturating_sub(offset);

        if remaining < RECORD_HEADER_SIZE as u64 {
            return Err(Error::TruncatedHeader { offset, available: remaining });
        }
        let header = RecordHeader::read(&mut self.reader)?;

        let available = remaining - RECORD_HEADER_SIZE as u64;
        if available < header.payload_length as u64 {
            return Err(Error::TruncatedPayload {
                offset,
                declared: header.payload_length,
                available,
            });
        }
        let mut payload = vec![0u8; header.payload_length as usize];
        self.reader.read_exact(&mut payload)?;

        self.position       += header.frame_len();
        self.bytes_consumed += header.frame_len();
        self.frames_read    += 1;
        tracing::debug!(offset, payload_length = header.payload_length, "read record frame");

        Ok(Some(RawFrame { offset, header, payload }))
    }

    /// Read every remaining frame.  Framing is inherently sequential; the
    /// returned list can then be decoded in any order.
    pub fn read_all_frames(&mut self) -> Result<Vec<RawFrame>> {
        self.by_ref().collect()
    }

    /// Iterate decoded records instead of raw frames.
    pub fn records(self) -> Records<R> {
        Records { inner: self }
    }
}

impl<R: Read + Seek> Iterator for ImgCacheReader<R> {
    type Item = Result<RawFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Decoded-record view over an [`ImgCacheReader`].
pub struct Records<R: Read + Seek> {
    inner: ImgCacheReader<R>,
}

impl<R: Read + Seek> Iterator for Records<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?.and_then(|frame| decode_frame(&frame));
        if item.is_err() {
            self.inner.done = true;
        }
        Some(item)
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct ImgCacheWriter<W: Write> {
    writer:            W,
    pub bytes_written: u64,
    pub frames_written: u64,
}

impl<W: Write> ImgCacheWriter<W> {
    pub fn new(mut writer: W) -> io::Result<Self> {
        write_magic(&mut writer)?;
        Ok(Self {
            writer,
            bytes_written:  MAGIC_SIZE as u64,
            frames_written: 0,
        })
    }

    pub fn write_frame(&mut self, frame: &RawFrame) -> io::Result<()> {
        self.write_parts(&frame.header, &[&frame.payload])
    }

    /// Write a header followed by payload pieces.  `payload_length` is not
    /// recomputed; the caller keeps the pieces consistent with it.
    pub fn write_parts(&mut self, header: &RecordHeader, parts: &[&[u8]]) -> io::Result<()> {
        header.write(&mut self.writer)?;
        for part in parts {
            self.writer.write_all(part)?;
        }
        self.bytes_written += RECORD_HEADER_SIZE as u64
            + parts.iter().map(|p| p.len() as u64).sum::<u64>();
        self.frames_written += 1;
        Ok(())
    }

    /// Convenience for building containers: frame `metadata` and
    /// `thumbnail` into one record with a correct `payload_length`.
    pub fn add_record(
        &mut self,
        mut header: RecordHeader,
        metadata:   &[u8],
        thumbnail:  &[u8],
    ) -> io::Result<()> {
        header.payload_length = u32::try_from(metadata.len() + thumbnail.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "record payload exceeds u32"))?;
        self.write_parts(&header, &[metadata, thumbnail])
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

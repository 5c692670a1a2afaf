use serde::Serialize;
use std::io::{self, Write};

use crate::record::Record;

/// Destination for decoded records.
///
/// Records arrive in container order, each exactly once, keyed by their
/// byte offset.  Unparsed records are delivered too, with every metadata
/// field absent and the raw bytes intact.
pub trait RecordSink {
    fn accept(&mut self, record: &Record) -> io::Result<()>;

    /// Called once after the last record of a successful run.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn accept(&mut self, record: &Record) -> io::Result<()> {
        (**self).accept(record)
    }

    fn finish(&mut self) -> io::Result<()> {
        (**self).finish()
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<Record>,
}

impl RecordSink for MemorySink {
    fn accept(&mut self, record: &Record) -> io::Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

/// Flat, serializable view of a record: one JSON object per line.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub offset:         u64,
    pub val1:           u32,
    pub val2:           u32,
    pub val3:           u32,
    pub record_offset:  u32,
    pub payload_length: u32,
    pub codec:          &'static str,
    pub parsed:         bool,
    pub app_path:       Option<String>,
    pub unk:            Option<u8>,
    pub file_path:      Option<String>,
    pub timestamp:      Option<i64>,
    /// RFC 3339, UTC.
    pub time_utc:       Option<String>,
    pub extra:          Option<String>,
    /// Raw metadata bytes, hex encoded.
    pub raw_meta:       String,
    pub thumbnail_len:  usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail:      Option<String>,
}

impl RecordRow {
    pub fn from_record(record: &Record, with_thumbnail: bool) -> Self {
        let m = &record.metadata;
        Self {
            offset:         record.offset,
            val1:           record.header.val1,
            val2:           record.header.val2,
            val3:           record.header.val3,
            record_offset:  record.header.record_offset,
            payload_length: record.header.payload_length,
            codec:          record.codec.name(),
            parsed:         record.is_parsed(),
            app_path:       m.internal_path.clone(),
            unk:            m.unk,
            file_path:      m.original_file_path.clone(),
            timestamp:      m.timestamp,
            time_utc:       m.datetime().map(|t| t.to_rfc3339()),
            extra:          m.extra.clone(),
            raw_meta:       hex::encode(&record.raw_metadata),
            thumbnail_len:  record.thumbnail.len(),
            thumbnail:      with_thumbnail.then(|| hex::encode(&record.thumbnail)),
        }
    }
}

/// Writes one [`RecordRow`] per line as JSON.
pub struct JsonLinesSink<W: Write> {
    writer:          W,
    with_thumbnails: bool,
    pub rows:        u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, with_thumbnails: false, rows: 0 }
    }

    /// Include the hex-encoded thumbnail in every row.
    pub fn with_thumbnails(mut self, yes: bool) -> Self {
        self.with_thumbnails = yes;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn accept(&mut self, record: &Record) -> io::Result<()> {
        let row = RecordRow::from_record(record, self.with_thumbnails);
        serde_json::to_writer(&mut self.writer, &row)?;
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

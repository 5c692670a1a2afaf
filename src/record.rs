use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memchr::memmem;
use std::io::{self, Read, Write};

use crate::codec::TextCodec;
use crate::error::{Error, Result};
use crate::fields::DecodedMetadata;

pub const RECORD_HEADER_SIZE: usize = 20;
/// JPEG SOI followed by the APP0 marker. Only used as a split point.
pub const THUMBNAIL_MARKER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

/// Fixed 20-byte record header: five little-endian `u32`s.
///
/// Only `payload_length` is interpreted; the other four fields are carried
/// through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordHeader {
    pub val1: u32,
    pub val2: u32,
    pub val3: u32,
    pub record_offset: u32,
    pub payload_length: u32,
}

impl RecordHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.val1)?;
        writer.write_u32::<LittleEndian>(self.val2)?;
        writer.write_u32::<LittleEndian>(self.val3)?;
        writer.write_u32::<LittleEndian>(self.record_offset)?;
        writer.write_u32::<LittleEndian>(self.payload_length)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            val1: reader.read_u32::<LittleEndian>()?,
            val2: reader.read_u32::<LittleEndian>()?,
            val3: reader.read_u32::<LittleEndian>()?,
            record_offset: reader.read_u32::<LittleEndian>()?,
            payload_length: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// Bytes this record occupies in the container, header included.
    pub fn frame_len(&self) -> u64 {
        RECORD_HEADER_SIZE as u64 + self.payload_length as u64
    }
}

/// One header + payload unit exactly as read from the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Byte offset of the header within the container.
    pub offset:  u64,
    pub header:  RecordHeader,
    pub payload: Vec<u8>,
}

/// A payload split at the thumbnail marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitPayload<'a> {
    pub metadata:  &'a [u8],
    /// Always begins with [`THUMBNAIL_MARKER`].
    pub thumbnail: &'a [u8],
}

/// Locate the first thumbnail marker in `payload` and split around it.
pub fn split_payload(payload: &[u8]) -> Option<SplitPayload<'_>> {
    let at = memmem::find(payload, &THUMBNAIL_MARKER)?;
    let (metadata, thumbnail) = payload.split_at(at);
    Some(SplitPayload { metadata, thumbnail })
}

impl RawFrame {
    pub fn split(&self) -> Result<SplitPayload<'_>> {
        split_payload(&self.payload)
            .ok_or(Error::MissingThumbnailMarker { offset: self.offset })
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        self.header.write(&mut writer)?;
        writer.write_all(&self.payload)
    }

    pub fn frame_len(&self) -> u64 {
        self.header.frame_len()
    }
}

/// Whether the metadata text matched the field grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStatus {
    Parsed,
    /// Nothing matched; every field is absent but `raw_metadata` is intact.
    Unparsed,
}

/// A fully decoded record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset:       u64,
    pub header:       RecordHeader,
    pub codec:        TextCodec,
    pub metadata:     DecodedMetadata,
    pub status:       MetadataStatus,
    pub raw_metadata: Vec<u8>,
    pub thumbnail:    Vec<u8>,
}

impl Record {
    pub fn is_parsed(&self) -> bool {
        self.status == MetadataStatus::Parsed
    }
}

/// Split, detect the codec and extract fields for one frame.
///
/// A missing marker or an undetermined codec is an error; a metadata string
/// that does not fit the grammar is not, and yields an `Unparsed` record.
pub fn decode_frame(frame: &RawFrame) -> Result<Record> {
    let split = frame.split()?;
    let codec = TextCodec::detect(split.metadata).ok_or_else(|| Error::UndeterminedCodec {
        offset: frame.offset,
        probe:  hex::encode(TextCodec::probe(split.metadata)),
    })?;
    let text = codec.decode_metadata(split.metadata);

    let (metadata, status) = match crate::fields::split_fields(&text) {
        Some(m) => (m, MetadataStatus::Parsed),
        None => {
            tracing::warn!(
                offset = frame.offset,
                "metadata in record not understood, keeping raw bytes only"
            );
            (DecodedMetadata::default(), MetadataStatus::Unparsed)
        }
    };

    Ok(Record {
        offset: frame.offset,
        header: frame.header,
        codec,
        metadata,
        status,
        raw_metadata: split.metadata.to_vec(),
        thumbnail: split.thumbnail.to_vec(),
    })
}

use std::io;
use thiserror::Error;

/// Every failure the decoder can raise.
///
/// All variants are run-fatal. A record whose metadata text cannot be split
/// into fields is not an error; see [`crate::record::MetadataStatus`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not an imgcache file: magic is {found}, expected 108524bd")]
    InvalidContainer { found: String },
    #[error("Truncated record header at offset {offset}: {available} of 20 bytes available")]
    TruncatedHeader { offset: u64, available: u64 },
    #[error("Truncated payload at offset {offset}: header declares {declared} bytes, {available} available")]
    TruncatedPayload { offset: u64, declared: u32, available: u64 },
    #[error("No thumbnail marker in record payload at offset {offset}")]
    MissingThumbnailMarker { offset: u64 },
    #[error("Codec detection failed for record at offset {offset}: probe bytes {probe}")]
    UndeterminedCodec { offset: u64, probe: String },
    #[error("Sanitized output is {written} bytes, input is {expected}")]
    OutputLengthMismatch { expected: u64, written: u64 },
    #[error("Input and output refer to the same file: {0}")]
    SameInputOutput(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Byte offset the failure was detected at, if it concerns a record.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Error::TruncatedHeader { offset, .. }
            | Error::TruncatedPayload { offset, .. }
            | Error::MissingThumbnailMarker { offset }
            | Error::UndeterminedCodec { offset, .. } => Some(*offset),
            Error::InvalidContainer { .. } => Some(0),
            Error::OutputLengthMismatch { .. }
            | Error::SameInputOutput(_)
            | Error::Io(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

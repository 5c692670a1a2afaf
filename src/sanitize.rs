//! Thumbnail sanitization.
//!
//! Every record keeps its header and metadata bytes untouched; the thumbnail
//! keeps its 4-byte marker and everything after it is zero-filled.  The
//! output has exactly the same length and record layout as the input.

use std::io::{Read, Seek, Write};

use crate::error::{Error, Result};
use crate::io_stream::{ImgCacheReader, ImgCacheWriter};
use crate::record::{split_payload, RawFrame, THUMBNAIL_MARKER};
use crate::run::MarkerPolicy;

/// Counters for one sanitize pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub records:          u64,
    /// Records passed through unchanged because they had no marker.
    pub skipped:          u64,
    /// Thumbnail bytes overwritten with zeros.
    pub bytes_zeroed:     u64,
    /// Input bytes consumed, magic included.
    pub bytes_read:       u64,
    pub bytes_written:    u64,
}

/// Rewrite one frame's payload with the thumbnail pixels zeroed.
///
/// Fails with `MissingThumbnailMarker` when the payload has no marker.
pub fn sanitize_frame(frame: &RawFrame) -> Result<RawFrame> {
    zero_thumbnail(frame).map(|(clean, _)| clean)
}

/// The sanitized frame and the number of pixel bytes it zeroed.
fn zero_thumbnail(frame: &RawFrame) -> Result<(RawFrame, usize)> {
    let split = split_payload(&frame.payload)
        .ok_or(Error::MissingThumbnailMarker { offset: frame.offset })?;
    let kept = split.metadata.len() + THUMBNAIL_MARKER.len();

    let mut payload = Vec::with_capacity(frame.payload.len());
    payload.extend_from_slice(split.metadata);
    payload.extend_from_slice(&THUMBNAIL_MARKER);
    payload.resize(frame.payload.len(), 0);

    let clean = RawFrame {
        offset:  frame.offset,
        header:  frame.header,
        payload,
    };
    Ok((clean, frame.payload.len() - kept))
}

/// Sanitize a whole container from `src` into `dst`.
///
/// With [`MarkerPolicy::Skip`], a record lacking the marker is copied through
/// verbatim and counted in [`SanitizeReport::skipped`]; otherwise it aborts.
pub fn sanitize<R, W>(src: R, dst: W, policy: MarkerPolicy) -> Result<SanitizeReport>
where
    R: Read + Seek,
    W: Write,
{
    let mut reader = ImgCacheReader::new(src)?;
    let mut writer = ImgCacheWriter::new(dst)?;
    let mut report = SanitizeReport::default();

    while let Some(frame) = reader.next_frame()? {
        match zero_thumbnail(&frame) {
            Ok((clean, zeroed)) => {
                report.bytes_zeroed += zeroed as u64;
                writer.write_frame(&clean)?;
            }
            Err(Error::MissingThumbnailMarker { offset }) if policy == MarkerPolicy::Skip => {
                tracing::warn!(offset, "no thumbnail marker, copying record unchanged");
                report.skipped += 1;
                writer.write_frame(&frame)?;
            }
            Err(e) => return Err(e),
        }
        report.records += 1;
    }

    report.bytes_read = reader.bytes_consumed();
    report.bytes_written = writer.bytes_written;
    writer.finish()?;
    tracing::info!(
        records = report.records,
        skipped = report.skipped,
        bytes = report.bytes_written,
        "sanitized container"
    );
    Ok(report)
}

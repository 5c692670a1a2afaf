//! Run driver: the one entry point both run modes go through.
//!
//! ```no_run
//! use imgcache::run::{run, RunConfig, RunMode};
//! use imgcache::sink::MemorySink;
//!
//! let mut sink = MemorySink::default();
//! let summary = run(&RunConfig::decode("imgcache.0"), &mut sink)?;
//! println!("{}", summary.summary());
//! # Ok::<(), imgcache::Error>(())
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::io_stream::ImgCacheReader;
use crate::perf::{WriteBuffer, DEFAULT_WRITE_BUFFER};
use crate::record::decode_frame;
use crate::sanitize::sanitize;
use crate::sink::RecordSink;

// ── Configuration ─────────────────────────────────────────────────────────────

/// What to do with a record whose payload has no thumbnail marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerPolicy {
    /// Stop the run with `MissingThumbnailMarker`.
    #[default]
    Abort,
    /// Log the offset, count it and carry on.  Decode mode drops the
    /// record; sanitize mode copies it through unchanged.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Decode every record and hand it to a sink.
    Decode,
    /// Write a copy of the container with thumbnail pixels zeroed.
    Sanitize { output: PathBuf },
}

/// Everything a run needs; built by the caller, never read from globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub mode:          RunMode,
    pub input:         PathBuf,
    pub marker_policy: MarkerPolicy,
}

impl RunConfig {
    pub fn decode<P: AsRef<Path>>(input: P) -> Self {
        Self {
            mode:          RunMode::Decode,
            input:         input.as_ref().to_owned(),
            marker_policy: MarkerPolicy::default(),
        }
    }

    pub fn sanitize<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Self {
        Self {
            mode:          RunMode::Sanitize { output: output.as_ref().to_owned() },
            input:         input.as_ref().to_owned(),
            marker_policy: MarkerPolicy::default(),
        }
    }

    pub fn with_marker_policy(mut self, policy: MarkerPolicy) -> Self {
        self.marker_policy = policy;
        self
    }
}

// ── Summary ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records read from the container, skipped ones included.
    pub records:    u64,
    /// Records emitted with every metadata field absent.
    pub unparsed:   u64,
    /// Records without a thumbnail marker, under `MarkerPolicy::Skip`.
    pub skipped:    u64,
    /// Input bytes read, magic included.  Equals `file_size` on success.
    pub bytes_read: u64,
    pub file_size:  u64,
}

impl RunSummary {
    pub fn summary(&self) -> String {
        format!(
            "{} record(s), {} unparsed, {} skipped, {}/{} bytes",
            self.records, self.unparsed, self.skipped, self.bytes_read, self.file_size,
        )
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Execute one run.  In sanitize mode `sink` is not used.
pub fn run<S: RecordSink>(config: &RunConfig, sink: &mut S) -> Result<RunSummary> {
    match &config.mode {
        RunMode::Decode => decode_file(&config.input, config.marker_policy, sink),
        RunMode::Sanitize { output } => sanitize_file(&config.input, output, config.marker_policy),
    }
}

fn decode_file<S: RecordSink>(input: &Path, policy: MarkerPolicy, sink: &mut S) -> Result<RunSummary> {
    let mut reader = ImgCacheReader::new(File::open(input)?)?;
    let mut summary = RunSummary { file_size: reader.file_size(), ..Default::default() };

    while let Some(frame) = reader.next_frame()? {
        summary.records += 1;
        let record = match decode_frame(&frame) {
            Ok(r) => r,
            Err(Error::MissingThumbnailMarker { offset }) if policy == MarkerPolicy::Skip => {
                tracing::warn!(offset, "no thumbnail marker, skipping record");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        if !record.is_parsed() {
            summary.unparsed += 1;
        }
        sink.accept(&record)?;
    }
    sink.finish()?;

    summary.bytes_read = reader.bytes_consumed();
    tracing::info!(path = %input.display(), "{}", summary.summary());
    Ok(summary)
}

/// Sanitize into `<output>.partial`, renamed over `output` on success.
fn sanitize_file(input: &Path, output: &Path, policy: MarkerPolicy) -> Result<RunSummary> {
    if same_file(input, output) {
        return Err(Error::SameInputOutput(output.display().to_string()));
    }
    let partial = partial_path(output);

    let result = (|| {
        let src = File::open(input)?;
        let file_size = src.metadata()?.len();
        let mut dst = WriteBuffer::new(File::create(&partial)?, DEFAULT_WRITE_BUFFER);
        let report = sanitize(src, &mut dst, policy)?;
        check_output_len(file_size, dst.bytes_written)?;
        dst.into_inner()?.sync_all()?;
        Ok::<_, Error>(RunSummary {
            records:    report.records,
            unparsed:   0,
            skipped:    report.skipped,
            bytes_read: report.bytes_read,
            file_size,
        })
    })();

    match result {
        Ok(summary) => {
            fs::rename(&partial, output)?;
            tracing::info!(path = %output.display(), "{}", summary.summary());
            Ok(summary)
        }
        Err(e) => {
            let _ = fs::remove_file(&partial);
            Err(e)
        }
    }
}

/// Sanitizing never changes the container length.
fn check_output_len(expected: u64, written: u64) -> Result<()> {
    if written != expected {
        return Err(Error::OutputLengthMismatch { expected, written });
    }
    Ok(())
}

/// `<output>.partial`: where output is staged until a run succeeds.
pub fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

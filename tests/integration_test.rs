use imgcache::record::THUMBNAIL_MARKER;
use imgcache::run::{run, MarkerPolicy, RunConfig};
use imgcache::sink::{JsonLinesSink, MemorySink};
use imgcache::{Error, ImgCacheReader, ImgCacheWriter, RecordHeader, TextCodec};
use proptest::prelude::*;
use std::fs::{self, File};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn thumbnail(pixels: &[u8]) -> Vec<u8> {
    let mut t = THUMBNAIL_MARKER.to_vec();
    t.extend_from_slice(pixels);
    t
}

/// Three records: UTF-16 with all fields, UTF-32 without a path, garbage.
fn sample_container() -> Vec<u8> {
    let mut w = ImgCacheWriter::new(Vec::new()).unwrap();
    w.add_record(
        RecordHeader { val1: 1, val2: 2, val3: 3, record_offset: 4, payload_length: 0 },
        &TextCodec::Utf16Le.encode_metadata("/data/app+2+/sdcard/photo.jpg+1609459200+note"),
        &thumbnail(&[0x11; 32]),
    ).unwrap();
    w.add_record(
        RecordHeader::default(),
        &TextCodec::Utf32Le.encode_metadata("/data/app+1609459200"),
        &thumbnail(&[0x22; 16]),
    ).unwrap();
    w.add_record(
        RecordHeader::default(),
        &TextCodec::Utf16Le.encode_metadata("no fields in here"),
        &thumbnail(&[0x33; 8]),
    ).unwrap();
    w.finish().unwrap()
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn decode(path: &Path) -> MemorySink {
    let mut sink = MemorySink::default();
    run(&RunConfig::decode(path), &mut sink).unwrap();
    sink
}

#[test]
fn test_decode_run() {
    let dir = TempDir::new().unwrap();
    let bytes = sample_container();
    let path = write_file(&dir, "imgcache.0", &bytes);

    let mut sink = MemorySink::default();
    let summary = run(&RunConfig::decode(&path), &mut sink).unwrap();
    assert_eq!(summary.records, 3);
    assert_eq!(summary.unparsed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.bytes_read, bytes.len() as u64);
    assert_eq!(summary.file_size, bytes.len() as u64);

    let r = &sink.records;
    assert_eq!(r.len(), 3);
    assert_eq!(r[0].offset, 4);
    assert_eq!(r[0].header.record_offset, 4);
    assert_eq!(r[0].codec, TextCodec::Utf16Le);
    assert_eq!(r[0].metadata.internal_path.as_deref(), Some("/data/app"));
    assert_eq!(r[0].metadata.unk, Some(2));
    assert_eq!(r[0].metadata.original_file_path.as_deref(), Some("/sdcard/photo.jpg"));
    assert_eq!(r[0].metadata.timestamp, Some(1609459200));
    assert_eq!(r[0].metadata.extra.as_deref(), Some("note"));
    assert_eq!(r[0].thumbnail.len(), 36);

    assert_eq!(r[1].codec, TextCodec::Utf32Le);
    assert_eq!(r[1].metadata.original_file_path, None);
    assert_eq!(r[1].metadata.extra, None, "the +kar sentinel must not leak");

    assert!(!r[2].is_parsed());
    assert!(r[2].metadata.is_empty());
    assert_eq!(r[2].raw_metadata, TextCodec::Utf16Le.encode_metadata("no fields in here"));
}

#[test]
fn test_decode_to_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "imgcache.0", &sample_container());

    let mut sink = JsonLinesSink::new(Vec::new());
    run(&RunConfig::decode(&path), &mut sink).unwrap();
    let out = String::from_utf8(sink.into_inner()).unwrap();

    let rows: Vec<serde_json::Value> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["file_path"], "/sdcard/photo.jpg");
    assert_eq!(rows[1]["codec"], "utf-32-le");
    assert_eq!(rows[2]["parsed"], false);
    assert!(rows[2]["timestamp"].is_null());
}

#[test]
fn test_sanitize_run() {
    let dir = TempDir::new().unwrap();
    let bytes = sample_container();
    let input = write_file(&dir, "imgcache.0", &bytes);
    let output = dir.path().join("clean.0");

    let summary = run(&RunConfig::sanitize(&input, &output), &mut MemorySink::default()).unwrap();
    assert_eq!(summary.records, 3);
    assert!(!dir.path().join("clean.0.partial").exists());

    let clean = fs::read(&output).unwrap();
    assert_eq!(clean.len(), bytes.len());

    let before = decode(&input).records;
    let after = decode(&output).records;
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.offset, a.offset);
        assert_eq!(b.header, a.header);
        assert_eq!(b.raw_metadata, a.raw_metadata);
        assert_eq!(b.metadata, a.metadata);
        assert_eq!(a.thumbnail.len(), b.thumbnail.len());
        assert_eq!(&a.thumbnail[..4], &THUMBNAIL_MARKER);
        assert!(a.thumbnail[4..].iter().all(|&x| x == 0));
    }
}

#[test]
fn test_sanitize_refuses_same_file() {
    let dir = TempDir::new().unwrap();
    let input = write_file(&dir, "imgcache.0", &sample_container());
    let err = run(&RunConfig::sanitize(&input, &input), &mut MemorySink::default()).unwrap_err();
    assert!(matches!(err, Error::SameInputOutput(_)));
    assert_eq!(fs::read(&input).unwrap(), sample_container());
}

#[test]
fn test_failed_sanitize_leaves_no_output() {
    let dir = TempDir::new().unwrap();
    let mut bytes = sample_container();
    bytes.truncate(bytes.len() - 3);
    let input = write_file(&dir, "imgcache.0", &bytes);
    let output = dir.path().join("clean.0");

    let err = run(&RunConfig::sanitize(&input, &output), &mut MemorySink::default()).unwrap_err();
    assert!(matches!(err, Error::TruncatedPayload { .. }));
    assert!(!output.exists());
    assert!(!dir.path().join("clean.0.partial").exists());
}

#[test]
fn test_missing_marker_policies() {
    let dir = TempDir::new().unwrap();
    let mut w = ImgCacheWriter::new(Vec::new()).unwrap();
    w.add_record(RecordHeader::default(), &TextCodec::Utf16Le.encode_metadata("/a+1609459200"), b"").unwrap();
    w.add_record(
        RecordHeader::default(),
        &TextCodec::Utf16Le.encode_metadata("/b+1609459201"),
        &thumbnail(&[1, 2]),
    ).unwrap();
    let path = write_file(&dir, "imgcache.0", &w.finish().unwrap());

    let err = run(&RunConfig::decode(&path), &mut MemorySink::default()).unwrap_err();
    assert!(matches!(err, Error::MissingThumbnailMarker { offset: 4 }));
    assert_eq!(err.offset(), Some(4));

    let mut sink = MemorySink::default();
    let config = RunConfig::decode(&path).with_marker_policy(MarkerPolicy::Skip);
    let summary = run(&config, &mut sink).unwrap();
    assert_eq!(summary.records, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(sink.records.len(), 1);
    assert_eq!(sink.records[0].metadata.internal_path.as_deref(), Some("/b"));
}

#[test]
fn test_undetermined_codec_is_fatal() {
    let dir = TempDir::new().unwrap();
    let mut w = ImgCacheWriter::new(Vec::new()).unwrap();
    w.add_record(RecordHeader::default(), &[0x00, 0xDC, 0x00, 0xDC], &thumbnail(&[])).unwrap();
    w.add_record(
        RecordHeader::default(),
        &TextCodec::Utf16Le.encode_metadata("/b+1609459201"),
        &thumbnail(&[]),
    ).unwrap();
    let path = write_file(&dir, "imgcache.0", &w.finish().unwrap());

    let mut sink = MemorySink::default();
    let err = run(&RunConfig::decode(&path), &mut sink).unwrap_err();
    assert!(matches!(err, Error::UndeterminedCodec { offset: 4, .. }));
    assert!(sink.records.is_empty());
}

#[test]
fn test_not_an_imgcache_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "other.bin", b".6cy and then some");
    let err = run(&RunConfig::decode(&path), &mut MemorySink::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidContainer { .. }));
    assert!(err.to_string().contains("2e366379"));
}

#[test]
fn test_reader_over_file() {
    let dir = TempDir::new().unwrap();
    let bytes = sample_container();
    let path = write_file(&dir, "imgcache.0", &bytes);
    let mut reader = ImgCacheReader::new(File::open(&path).unwrap()).unwrap();
    let frames = reader.read_all_frames().unwrap();
    let records = imgcache::perf::decode_frames_parallel(&frames).unwrap();
    assert_eq!(records, decode(&path).records);
}

// ── Properties ───────────────────────────────────────────────────────────────

prop_compose! {
    /// (metadata text, pixel bytes) for one record.  ASCII text encoded in
    /// either codec never contains 0xFF, so the marker is found where it was
    /// placed.
    fn arb_record()(
        text in "[a-z0-9/+._]{0,40}",
        wide in any::<bool>(),
        pixels in proptest::collection::vec(any::<u8>(), 0..64),
    ) -> (Vec<u8>, Vec<u8>) {
        let codec = if wide { TextCodec::Utf32Le } else { TextCodec::Utf16Le };
        (codec.encode_metadata(&text), pixels)
    }
}

fn build(records: &[(Vec<u8>, Vec<u8>)]) -> Vec<u8> {
    let mut w = ImgCacheWriter::new(Vec::new()).unwrap();
    for (meta, pixels) in records {
        w.add_record(RecordHeader::default(), meta, &thumbnail(pixels)).unwrap();
    }
    w.finish().unwrap()
}

proptest! {
    #[test]
    fn prop_frames_account_for_every_byte(records in proptest::collection::vec(arb_record(), 0..12)) {
        let bytes = build(&records);
        let frames = ImgCacheReader::new(Cursor::new(bytes.clone()))
            .unwrap()
            .read_all_frames()
            .unwrap();
        prop_assert_eq!(frames.len(), records.len());
        let total: u64 = frames.iter().map(|f| 20 + f.header.payload_length as u64).sum();
        prop_assert_eq!(total, bytes.len() as u64 - 4);
    }

    #[test]
    fn prop_sanitize_preserves_layout(records in proptest::collection::vec(arb_record(), 0..12)) {
        let bytes = build(&records);
        let mut out = Vec::new();
        imgcache::sanitize::sanitize(Cursor::new(bytes.clone()), &mut out, MarkerPolicy::Abort).unwrap();
        prop_assert_eq!(out.len(), bytes.len());

        let before = ImgCacheReader::new(Cursor::new(bytes)).unwrap().read_all_frames().unwrap();
        let after = ImgCacheReader::new(Cursor::new(out)).unwrap().read_all_frames().unwrap();
        for ((b, a), (meta, _)) in before.iter().zip(&after).zip(&records) {
            prop_assert_eq!(b.header, a.header);
            let split = a.split().unwrap();
            prop_assert_eq!(split.metadata, &meta[..]);
            prop_assert_eq!(&split.thumbnail[..4], &THUMBNAIL_MARKER[..]);
            prop_assert!(split.thumbnail[4..].iter().all(|&x| x == 0));
        }
    }

    #[test]
    fn prop_detect_recovers_encoding_codec(text in "\\PC{1,40}", wide in any::<bool>()) {
        // Printable UTF-16 units are all above 0x10, so two of them never
        // form a valid UTF-32 scalar.
        let codec = if wide { TextCodec::Utf32Le } else { TextCodec::Utf16Le };
        prop_assert_eq!(TextCodec::detect(&codec.encode_metadata(&text)), Some(codec));
    }

    #[test]
    fn prop_split_fields_never_panics(text in "\\PC{0,80}") {
        let _ = imgcache::split_fields(&text);
    }
}

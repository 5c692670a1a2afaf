//! Text codec detection for record metadata.
//!
//! # Candidates
//! Metadata strings are written in one of two fixed-width encodings:
//! UTF-32LE (4-byte code units) or UTF-16LE (2-byte code units).  There is
//! no tag saying which; the codec is sniffed from the first 4 bytes.
//!
//! # Priority
//! UTF-32LE is always tried first.  A UTF-32LE probe such as `2F 00 00 00`
//! is also a well-formed UTF-16LE pair (`"/\0"`), so trying UTF-16LE first
//! would silently misdecode every UTF-32 record.  The reverse ambiguity does
//! not arise for printable text: two UTF-16LE ASCII units form a UTF-32
//! value above U+10FFFF.
//!
//! # Sentinel
//! UTF-32LE strings are followed by the UTF-16LE bytes of `"+kar"`.  They are
//! stripped before decoding and never surface as metadata text.

/// Number of leading metadata bytes inspected by [`TextCodec::detect`].
pub const PROBE_LEN: usize = 4;

/// `"+kar"` encoded UTF-16LE, trailing every UTF-32LE metadata string.
pub const KAR_SENTINEL: [u8; 8] = [0x2B, 0x00, 0x6B, 0x00, 0x61, 0x00, 0x72, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextCodec {
    Utf32Le,
    Utf16Le,
}

impl TextCodec {
    /// Order in which [`detect`](Self::detect) tries the candidates.
    pub const DETECTION_ORDER: [TextCodec; 2] = [TextCodec::Utf32Le, TextCodec::Utf16Le];

    /// Code unit width in bytes.
    #[inline]
    pub fn unit_width(self) -> usize {
        match self {
            TextCodec::Utf32Le => 4,
            TextCodec::Utf16Le => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TextCodec::Utf32Le => "utf-32-le",
            TextCodec::Utf16Le => "utf-16-le",
        }
    }

    /// The bytes detection looks at: at most the first [`PROBE_LEN`].
    pub fn probe(metadata: &[u8]) -> &[u8] {
        &metadata[..metadata.len().min(PROBE_LEN)]
    }

    /// Return the first codec in [`DETECTION_ORDER`](Self::DETECTION_ORDER)
    /// that decodes the probe without error, or `None` if neither does.
    pub fn detect(metadata: &[u8]) -> Option<Self> {
        let probe = Self::probe(metadata);
        Self::DETECTION_ORDER
            .into_iter()
            .find(|codec| codec.decodes_strictly(probe))
    }

    /// True when `bytes` is a whole number of code units and every unit
    /// sequence is a valid scalar value.
    pub fn decodes_strictly(self, bytes: &[u8]) -> bool {
        if bytes.len() % self.unit_width() != 0 {
            return false;
        }
        match self {
            TextCodec::Utf32Le => utf32_units(bytes).all(|u| char::from_u32(u).is_some()),
            TextCodec::Utf16Le => char::decode_utf16(utf16_units(bytes)).all(|r| r.is_ok()),
        }
    }

    /// Decode, dropping invalid sequences and any trailing partial unit.
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        match self {
            TextCodec::Utf32Le => utf32_units(bytes).filter_map(char::from_u32).collect(),
            TextCodec::Utf16Le => char::decode_utf16(utf16_units(bytes))
                .filter_map(|r| r.ok())
                .collect(),
        }
    }

    /// Decode a record's metadata bytes, removing the UTF-32 `"+kar"`
    /// sentinel first.
    pub fn decode_metadata(self, metadata: &[u8]) -> String {
        let body = match self {
            TextCodec::Utf32Le => metadata.strip_suffix(&KAR_SENTINEL).unwrap_or(metadata),
            TextCodec::Utf16Le => metadata,
        };
        self.decode_lossy(body)
    }

    /// Encode `text` in this codec. UTF-32 output carries the sentinel, so
    /// the result has the same shape as metadata found in real containers.
    pub fn encode_metadata(self, text: &str) -> Vec<u8> {
        match self {
            TextCodec::Utf32Le => {
                let mut out: Vec<u8> = text.chars().flat_map(|c| (c as u32).to_le_bytes()).collect();
                out.extend_from_slice(&KAR_SENTINEL);
                out
            }
            TextCodec::Utf16Le => text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect(),
        }
    }
}

fn utf32_units(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
}

fn utf16_units(bytes: &[u8]) -> impl Iterator<Item = u16> + '_ {
    bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf32_probe_wins_over_utf16() {
        let bytes = TextCodec::Utf32Le.encode_metadata("/data");
        // The same probe is also valid UTF-16LE.
        assert!(TextCodec::Utf16Le.decodes_strictly(TextCodec::probe(&bytes)));
        assert_eq!(TextCodec::detect(&bytes), Some(TextCodec::Utf32Le));
    }

    #[test]
    fn utf16_probe_is_not_utf32() {
        let bytes = TextCodec::Utf16Le.encode_metadata("/data");
        assert!(!TextCodec::Utf32Le.decodes_strictly(TextCodec::probe(&bytes)));
        assert_eq!(TextCodec::detect(&bytes), Some(TextCodec::Utf16Le));
    }

    #[test]
    fn neither_codec() {
        // 0xDC00 twice: lone low surrogates, and > U+10FFFF as a u32.
        assert_eq!(TextCodec::detect(&[0x00, 0xDC, 0x00, 0xDC, 0x41]), None);
        // Three bytes: not a whole unit in either codec.
        assert_eq!(TextCodec::detect(&[0x41, 0x00, 0x42]), None);
    }

    #[test]
    fn short_probe() {
        assert_eq!(TextCodec::detect(&[0x41, 0x00]), Some(TextCodec::Utf16Le));
        assert_eq!(TextCodec::detect(&[]), Some(TextCodec::Utf32Le));
    }

    #[test]
    fn sentinel_is_stripped() {
        let bytes = TextCodec::Utf32Le.encode_metadata("/a+1609459200+note");
        assert!(bytes.ends_with(&KAR_SENTINEL));
        assert_eq!(TextCodec::Utf32Le.decode_metadata(&bytes), "/a+1609459200+note");
    }

    #[test]
    fn lossy_decode_drops_invalid_units() {
        let mut bytes = TextCodec::Utf16Le.encode_metadata("ab");
        bytes.extend_from_slice(&[0x00, 0xDC]); // lone surrogate
        bytes.extend_from_slice(&TextCodec::Utf16Le.encode_metadata("c"));
        bytes.push(0x7F); // trailing partial unit
        assert_eq!(TextCodec::Utf16Le.decode_lossy(&bytes), "abc");
    }

    #[test]
    fn names_and_widths() {
        assert_eq!(TextCodec::Utf32Le.name(), "utf-32-le");
        assert_eq!(TextCodec::Utf16Le.name(), "utf-16-le");
        assert_eq!(TextCodec::Utf32Le.unit_width(), 4);
        assert_eq!(TextCodec::Utf16Le.unit_width(), 2);
    }
}

//! Field extraction from decoded metadata text.
//!
//! Metadata is `+`-delimited:
//!
//! ```text
//! internal '+' [digit] ['+'] [path '.' ext] ['+'] timestamp ['+'] [extra]
//! ```
//!
//! `ext` is 3 or 4 word characters and `timestamp` exactly 10 ASCII digits.
//! Paths may themselves contain `+`, so splitting on the delimiter is not
//! enough: each optional field is tried in a fixed order (present before
//! absent, shortest internal path and original path first) and the first
//! combination that reaches a timestamp wins.  Once a timestamp is found the
//! remainder of the line is the free-text tail, so the only way to fail is
//! to never reach ten digits.

use chrono::{DateTime, Utc};

pub const DELIMITER: char = '+';
pub const TIMESTAMP_DIGITS: usize = 10;
/// File extension lengths, in the order they are tried.
const EXTENSION_LENGTHS: [usize; 2] = [4, 3];

/// The five fields carried by a record's metadata string.
///
/// Any field may be absent; absence is not corruption.  A record whose text
/// matched nothing carries `DecodedMetadata::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedMetadata {
    pub internal_path:      Option<String>,
    pub unk:                Option<u8>,
    pub original_file_path: Option<String>,
    /// Unix epoch seconds.
    pub timestamp:          Option<i64>,
    pub extra:              Option<String>,
}

impl DecodedMetadata {
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ts| DateTime::from_timestamp(ts, 0))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract the metadata fields from `text`.
///
/// Returns `None` only when the grammar matches nowhere in the text.
pub fn split_fields(text: &str) -> Option<DecodedMetadata> {
    let chars: Vec<char> = text.chars().collect();
    let splitter = Splitter { s: &chars };

    // A match starting mid-line would also have matched from the line start,
    // so only line starts need to be tried.
    let starts = std::iter::once(0).chain(
        chars.iter().enumerate().filter(|&(_, &c)| c == '\n').map(|(i, _)| i + 1),
    );
    for start in starts {
        if let Some(m) = splitter.from_line_start(start) {
            return Some(m);
        }
    }
    None
}

struct Splitter<'a> {
    s: &'a [char],
}

impl Splitter<'_> {
    fn at(&self, i: usize) -> Option<char> {
        self.s.get(i).copied()
    }

    fn text(&self, from: usize, to: usize) -> String {
        self.s[from..to].iter().collect()
    }

    /// Internal path: the shortest non-empty run followed by a delimiter
    /// for which the rest matches.
    fn from_line_start(&self, start: usize) -> Option<DecodedMetadata> {
        for plus in (start + 1)..self.s.len() {
            if self.s[plus - 1] == '\n' {
                break;
            }
            if self.s[plus] != DELIMITER {
                continue;
            }
            if let Some(mut m) = self.unk(plus + 1) {
                m.internal_path = Some(self.text(start, plus));
                return Some(m);
            }
        }
        None
    }

    fn unk(&self, pos: usize) -> Option<DecodedMetadata> {
        if let Some(d) = self.at(pos).and_then(|c| c.to_digit(10)) {
            if let Some(mut m) = self.optional_delimiter(pos + 1, Self::original_path) {
                m.unk = Some(d as u8);
                return Some(m);
            }
        }
        self.optional_delimiter(pos, Self::original_path)
    }

    /// Try `next` after consuming a delimiter at `pos`, then without.
    fn optional_delimiter(
        &self,
        pos: usize,
        next: fn(&Self, usize) -> Option<DecodedMetadata>,
    ) -> Option<DecodedMetadata> {
        if self.at(pos) == Some(DELIMITER) {
            if let Some(m) = next(self, pos + 1) {
                return Some(m);
            }
        }
        next(self, pos)
    }

    /// Original file path: shortest run ending in `.ext`, or nothing.
    fn original_path(&self, pos: usize) -> Option<DecodedMetadata> {
        for dot in (pos + 1)..self.s.len() {
            if self.s[dot - 1] == '\n' {
                break;
            }
            if self.s[dot] != '.' {
                continue;
            }
            for ext in EXTENSION_LENGTHS {
                let end = dot + 1 + ext;
                if end > self.s.len() || !self.s[dot + 1..end].iter().all(|&c| is_word(c)) {
                    continue;
                }
                if let Some(mut m) = self.optional_delimiter(end, Self::timestamp) {
                    m.original_file_path = Some(self.text(pos, end));
                    return Some(m);
                }
            }
        }
        self.optional_delimiter(pos, Self::timestamp)
    }

    /// Exactly ten digits, then an optional delimiter and the line tail.
    fn timestamp(&self, pos: usize) -> Option<DecodedMetadata> {
        let end = pos + TIMESTAMP_DIGITS;
        if end > self.s.len() || !self.s[pos..end].iter().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let ts = self.text(pos, end).parse::<i64>().ok()?;

        let mut tail = end;
        if self.at(tail) == Some(DELIMITER) {
            tail += 1;
        }
        let line_end = self.s[tail..]
            .iter()
            .position(|&c| c == '\n')
            .map_or(self.s.len(), |i| tail + i);
        let extra = (line_end > tail).then(|| self.text(tail, line_end));

        Some(DecodedMetadata {
            timestamp: Some(ts),
            extra,
            ..Default::default()
        })
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

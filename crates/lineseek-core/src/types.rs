//! Core data types for lineseek.
//!
//! These types describe the sparse checkpoint index: individual checkpoint
//! entries, the validity status of an index relative to its source file, and
//! the filesystem facts (size, modification time) the status is derived from.

use std::cmp::Ordering;
use std::fmt;
use std::fs::Metadata;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// A recorded (byte offset, line number, optional content fragment) sample.
///
/// `file_offset` is where the next unread line begins and `line_number` is the
/// number of complete lines before that offset. When the index was built with
/// a non-zero snap length, `fragment` holds the leading bytes of the line that
/// starts at `file_offset`, without its newline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointEntry {
    /// Byte offset of the next line in the source file
    pub file_offset: u64,

    /// Count of lines preceding `file_offset`
    pub line_number: u64,

    /// Leading bytes of the line at `file_offset`
    pub fragment: Option<Vec<u8>>,
}

impl CheckpointEntry {
    /// Create an entry without a fragment (e.g. a terminal entry)
    pub fn new(file_offset: u64, line_number: u64) -> Self {
        CheckpointEntry {
            file_offset,
            line_number,
            fragment: None,
        }
    }

    /// Attach a captured fragment
    pub fn with_fragment(mut self, fragment: Option<Vec<u8>>) -> Self {
        self.fragment = fragment;
        self
    }

    /// Fragment as a byte slice, if captured
    pub fn fragment(&self) -> Option<&[u8]> {
        self.fragment.as_deref()
    }
}

/// Validity of an index relative to the current state of its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexStatus {
    /// No index file exists yet
    #[default]
    Absent,

    /// The index covers the source file exactly as it is now
    Fresh,

    /// The source grew past the last indexed point; the index can be extended
    Stale,

    /// The source shrank or was replaced; the index must be rebuilt
    Invalid,
}

impl IndexStatus {
    /// Human-readable description used in listings
    pub fn description(&self) -> &'static str {
        match self {
            IndexStatus::Absent => "Not found",
            IndexStatus::Fresh => "Up to date",
            IndexStatus::Stale => "Out of date (needs refresh)",
            IndexStatus::Invalid => "Invalid (needs rebuild)",
        }
    }

    /// Short machine-friendly name
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Absent => "absent",
            IndexStatus::Fresh => "fresh",
            IndexStatus::Stale => "stale",
            IndexStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Size and fractional modification time of a file.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,

    /// Modification time in seconds since the Unix epoch, sub-second precision kept
    pub mtime: f64,
}

impl FileStat {
    /// Extract size and mtime from file metadata
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        FileStat {
            size: metadata.len(),
            mtime,
        }
    }

    /// Stat a path
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_metadata(&std::fs::metadata(path)?))
    }
}

/// Compare two byte strings over the length of the shorter one.
///
/// This is the ordering used between query bounds and stored fragments:
/// a fragment is truncated to the snap length, so only the common prefix
/// length is meaningful.
pub fn truncated_cmp(a: &[u8], b: &[u8]) -> Ordering {
    let n = a.len().min(b.len());
    a[..n].cmp(&b[..n])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_cmp() {
        assert_eq!(truncated_cmp(b"abc", b"abd"), Ordering::Less);
        assert_eq!(truncated_cmp(b"abc", b"ab"), Ordering::Equal);
        assert_eq!(truncated_cmp(b"b", b"abc"), Ordering::Greater);
        assert_eq!(truncated_cmp(b"", b"abc"), Ordering::Equal);
    }

    #[test]
    fn test_entry_fragment() {
        let entry = CheckpointEntry::new(10, 2).with_fragment(Some(b"key".to_vec()));
        assert_eq!(entry.fragment(), Some(&b"key"[..]));
        assert_eq!(CheckpointEntry::new(0, 0).fragment(), None);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(IndexStatus::default(), IndexStatus::Absent);
        assert_eq!(IndexStatus::Stale.to_string(), "stale");
        assert_eq!(IndexStatus::Fresh.description(), "Up to date");
    }
}

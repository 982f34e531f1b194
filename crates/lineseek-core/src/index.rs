//! In-memory representation of a sparse line index.
//!
//! The `Index` holds the ordered checkpoint entries for one source file along
//! with the metadata needed to decide whether those entries still describe the
//! file. It is produced by [`persistence::load`](crate::persistence::load),
//! refreshed in place by the [`builder`](crate::builder), and read by
//! [`search`](crate::search).
//!
//! ## Lifecycle
//!
//! - `Absent`: no index file; no entries
//! - `Fresh`: last entry sits exactly at the current end of file
//! - `Stale`: file grew; the terminal entry was dropped on load
//! - `Invalid`: file shrank or was replaced; entries were discarded on load

use crate::persistence;
use crate::types::{CheckpointEntry, FileStat, IndexStatus};
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Default byte interval between checkpoints
pub const DEFAULT_CHUNK_SIZE: u64 = 1_000_000;

/// The index for a single source file.
#[derive(Debug, Clone)]
pub struct Index {
    /// Absolute path of the indexed source file
    pub(crate) source_path: PathBuf,

    /// Path of the on-disk index file
    pub(crate) index_path: PathBuf,

    /// Validity relative to the source file
    pub(crate) status: IndexStatus,

    /// Source size at load time, or the size covered after a build
    pub(crate) source_size: u64,

    /// Total line count, known once the index is fresh
    pub(crate) source_line_count: Option<u64>,

    /// Source modification time at load time
    pub(crate) source_mtime: f64,

    /// Size of the index file on disk, if it exists
    pub(crate) index_file_size: Option<u64>,

    /// Modification time of the index file, if it exists
    pub(crate) index_mtime: Option<f64>,

    /// Byte interval between checkpoints used by the last build
    pub(crate) chunk_size: u64,

    /// Snap length used by the last build (0 = no fragments)
    pub(crate) snap_length: usize,

    /// Size recorded by the last entry when the index was loaded
    pub(crate) previous_source_size: Option<u64>,

    /// Line count recorded by the last entry when the index was loaded
    pub(crate) previous_source_line_count: Option<u64>,

    /// Ordered checkpoint entries
    pub(crate) entries: Vec<CheckpointEntry>,
}

impl Index {
    /// Create an empty (`Absent`) index for a source file.
    pub fn new(
        source_path: impl Into<PathBuf>,
        index_path: impl Into<PathBuf>,
        source: FileStat,
    ) -> Self {
        Index {
            source_path: source_path.into(),
            index_path: index_path.into(),
            status: IndexStatus::Absent,
            source_size: source.size,
            source_line_count: None,
            source_mtime: source.mtime,
            index_file_size: None,
            index_mtime: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            snap_length: 0,
            previous_source_size: None,
            previous_source_line_count: None,
            entries: Vec::new(),
        }
    }

    /// Load the index for `source_path` stored at `index_path`.
    ///
    /// Shorthand for [`persistence::load`].
    pub fn load(source_path: &Path, index_path: &Path) -> Result<Self> {
        persistence::load(source_path, index_path)
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn status(&self) -> IndexStatus {
        self.status
    }

    /// True if an index file existed when this index was loaded or has since been written
    pub fn exists(&self) -> bool {
        self.status != IndexStatus::Absent
    }

    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    pub fn source_line_count(&self) -> Option<u64> {
        self.source_line_count
    }

    pub fn source_mtime(&self) -> f64 {
        self.source_mtime
    }

    pub fn index_file_size(&self) -> Option<u64> {
        self.index_file_size
    }

    pub fn index_mtime(&self) -> Option<f64> {
        self.index_mtime
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn snap_length(&self) -> usize {
        self.snap_length
    }

    pub fn previous_source_size(&self) -> Option<u64> {
        self.previous_source_size
    }

    pub fn previous_source_line_count(&self) -> Option<u64> {
        self.previous_source_line_count
    }

    /// Checkpoint entries in file order
    pub fn entries(&self) -> &[CheckpointEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last entry, if any
    pub fn last_entry(&self) -> Option<&CheckpointEntry> {
        self.entries.last()
    }

    /// True if every non-terminal entry carries a fragment.
    pub fn supports_content_search(&self) -> bool {
        let n = self.entries.len();
        n <= 1 || self.entries[..n - 1].iter().all(|e| e.fragment.is_some())
    }

    /// Classify the loaded entries against the current source state.
    ///
    /// Called once after parsing. The mtime comparison is a heuristic for a
    /// replaced file: a source older than its index cannot have grown since the
    /// index was written. It can misclassify a file whose mtime was set back.
    pub(crate) fn classify(&mut self) {
        let Some(last) = self.last_entry() else {
            return;
        };
        let (last_offset, last_lines) = (last.file_offset, last.line_number);
        self.previous_source_size = Some(last_offset);
        self.previous_source_line_count = Some(last_lines);

        let older_than_index = self
            .index_mtime
            .map_or(false, |index_mtime| self.source_mtime < index_mtime);

        if last_offset == self.source_size {
            self.status = IndexStatus::Fresh;
            self.source_line_count = Some(last_lines);
        } else if self.source_size < last_offset || older_than_index {
            self.status = IndexStatus::Invalid;
            self.entries.clear();
        } else {
            self.status = IndexStatus::Stale;
            self.entries.pop();
        }
    }
}

//! Building and refreshing indexes.
//!
//! [`IndexBuilder`] scans a source file and records a checkpoint every
//! `chunk_size` bytes. A stale index is extended from its last surviving
//! checkpoint rather than rebuilt, so appending to a large file only costs a
//! scan of the new data.
//!
//! When a snap length is configured, each checkpoint also captures the leading
//! bytes of the line it points at, and the builder verifies that those leading
//! bytes never decrease. An unsorted source aborts the build without touching
//! the index file.

use crate::error::{LineseekError, Result};
use crate::index::{Index, DEFAULT_CHUNK_SIZE};
use crate::persistence;
use crate::reader::LineReader;
use crate::types::{CheckpointEntry, IndexStatus};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default number of bytes between progress reports
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100 * 1000 * 1000;

/// Options controlling a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Bytes between checkpoints
    pub chunk_size: u64,

    /// Leading bytes captured per checkpoint (0 = no content search)
    pub snap_length: usize,

    /// Discard existing entries and rebuild from the start
    pub force: bool,

    /// Scan and validate, but do not write the index
    pub dry_run: bool,

    /// A content query will follow; a new index must capture fragments
    pub for_content_search: bool,

    /// Bytes between progress callbacks
    pub progress_interval: u64,

    /// Optional cap on a single line's length
    pub max_line_length: Option<usize>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            chunk_size: DEFAULT_CHUNK_SIZE,
            snap_length: 0,
            force: false,
            dry_run: false,
            for_content_search: false,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_line_length: None,
        }
    }
}

impl BuildOptions {
    pub fn new(chunk_size: u64, snap_length: usize) -> Self {
        BuildOptions {
            chunk_size,
            snap_length,
            ..Default::default()
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn for_content_search(mut self, for_content_search: bool) -> Self {
        self.for_content_search = for_content_search;
        self
    }

    pub fn progress_interval(mut self, bytes: u64) -> Self {
        self.progress_interval = bytes;
        self
    }

    pub fn max_line_length(mut self, limit: Option<usize>) -> Self {
        self.max_line_length = limit;
        self
    }

    /// Check that chunk size and snap length are usable together.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(LineseekError::ConfigError {
                reason: "chunk size must be positive".to_string(),
            });
        }
        if self.snap_length > 0 && self.snap_length as u64 >= self.chunk_size {
            return Err(LineseekError::ConfigError {
                reason: format!(
                    "snap length {} must be less than chunk size {}",
                    self.snap_length, self.chunk_size
                ),
            });
        }
        Ok(())
    }
}

/// What a build did (or would do, in a dry run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildAction {
    /// The index already covered the file
    UpToDate,
    /// A new index was created
    Created,
    /// An out-of-date index was extended
    Refreshed,
    /// An existing index was discarded and rebuilt
    Rebuilt,
}

impl fmt::Display for BuildAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildAction::UpToDate => write!(f, "up to date"),
            BuildAction::Created => write!(f, "created"),
            BuildAction::Refreshed => write!(f, "refreshed"),
            BuildAction::Rebuilt => write!(f, "rebuilt"),
        }
    }
}

/// Outcome of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub action: BuildAction,

    /// Number of entries in the resulting index
    pub entries: usize,

    /// Bytes of the source covered by the index
    pub bytes_indexed: u64,

    /// Lines in the covered part of the source
    pub lines: u64,

    /// The source grew while it was being scanned
    pub grew_during_build: bool,

    /// The index file was written
    pub written: bool,
}

/// Progress reporting for long builds
pub trait BuildProgress: Send + Sync {
    /// Called every `progress_interval` bytes with the bytes scanned so far
    fn on_progress(&self, bytes_scanned: u64, bytes_total: u64);

    /// Called when the scan reaches end of file
    fn on_complete(&self, bytes_scanned: u64, lines: u64);
}

/// A progress reporter that logs to tracing
pub struct LoggingProgress {
    file: String,
}

impl LoggingProgress {
    pub fn new(file: impl Into<String>) -> Self {
        LoggingProgress { file: file.into() }
    }
}

impl BuildProgress for LoggingProgress {
    fn on_progress(&self, bytes_scanned: u64, bytes_total: u64) {
        let percent = if bytes_total == 0 {
            100.0
        } else {
            100.0 * bytes_scanned as f64 / bytes_total as f64
        };
        info!(
            file = %self.file,
            bytes = bytes_scanned,
            total = bytes_total,
            "Indexed {:5.1}%",
            percent
        );
    }

    fn on_complete(&self, bytes_scanned: u64, lines: u64) {
        debug!(file = %self.file, bytes = bytes_scanned, lines, "Scan complete");
    }
}

/// Builds or refreshes an [`Index`].
pub struct IndexBuilder {
    options: BuildOptions,
    progress: Option<Arc<dyn BuildProgress>>,
}

impl IndexBuilder {
    pub fn new(options: BuildOptions) -> Self {
        IndexBuilder {
            options,
            progress: None,
        }
    }

    /// Report scan progress to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn BuildProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Bring `index` up to date with its source file.
    ///
    /// On success (and outside a dry run) the index file has been rewritten
    /// and `index` is `Fresh`. On failure neither the file nor `index` change.
    pub fn build(&self, index: &mut Index) -> Result<BuildReport> {
        let opts = &self.options;
        opts.validate()?;

        let status = index.status();
        let exists = index.exists();

        if !exists && opts.for_content_search && opts.snap_length == 0 {
            return Err(LineseekError::invalid_query(
                "a snap length is required for a new index used for content search",
            ));
        }

        // A content query against an index without fragments needs a rebuild
        let needs_fragments =
            exists && opts.for_content_search && opts.snap_length > 0 && index.snap_length() == 0;

        if !opts.force && !needs_fragments && status == IndexStatus::Fresh {
            debug!(path = %index.index_path().display(), "Index is up to date");
            return Ok(BuildReport {
                action: BuildAction::UpToDate,
                entries: index.len(),
                bytes_indexed: index.source_size(),
                lines: index.source_line_count().unwrap_or(0),
                grew_during_build: false,
                written: false,
            });
        }

        if exists && index.chunk_size() != opts.chunk_size {
            info!(
                path = %index.index_path().display(),
                from = index.chunk_size(),
                to = opts.chunk_size,
                "Chunk size changed"
            );
        }

        let mut restart = opts.force || needs_fragments;
        if status == IndexStatus::Stale && index.snap_length() != opts.snap_length {
            info!(
                path = %index.index_path().display(),
                from = index.snap_length(),
                to = opts.snap_length,
                "Snap length changed, rebuilding index"
            );
            restart = true;
        }

        let action = match status {
            IndexStatus::Absent => BuildAction::Created,
            IndexStatus::Stale if !restart => BuildAction::Refreshed,
            _ => BuildAction::Rebuilt,
        };

        match action {
            BuildAction::Created => info!(
                source = %index.source_path().display(),
                index = %index.index_path().display(),
                bytes = index.source_size(),
                dry_run = opts.dry_run,
                "Creating new index"
            ),
            BuildAction::Refreshed => info!(
                source = %index.source_path().display(),
                previous_bytes = index.previous_source_size().unwrap_or(0),
                bytes = index.source_size(),
                dry_run = opts.dry_run,
                "Appending to out-of-date index"
            ),
            _ => info!(
                source = %index.source_path().display(),
                index = %index.index_path().display(),
                bytes = index.source_size(),
                forced = opts.force,
                dry_run = opts.dry_run,
                "Rebuilding index"
            ),
        }

        let entries = if restart {
            Vec::new()
        } else {
            index.entries().to_vec()
        };
        let scan = self.scan(index, entries)?;

        let expected = index.source_size();
        if scan.offset < expected {
            return Err(LineseekError::SourceShrankDuringBuild {
                path: index.source_path().to_path_buf(),
                expected,
                actual: scan.offset,
            });
        }
        let grew_during_build = scan.offset > expected;
        if grew_during_build {
            warn!(
                path = %index.source_path().display(),
                from = expected,
                to = scan.offset,
                "File grew while indexing it"
            );
        }

        let mut report = BuildReport {
            action,
            entries: scan.entries.len(),
            bytes_indexed: scan.offset,
            lines: scan.line_number,
            grew_during_build,
            written: false,
        };

        if opts.dry_run {
            info!(
                index = %index.index_path().display(),
                entries = report.entries,
                "Dry run: would {} index",
                if exists { "refresh" } else { "create" }
            );
            return Ok(report);
        }

        let mut updated = index.clone();
        updated.entries = scan.entries;
        updated.chunk_size = opts.chunk_size;
        updated.snap_length = opts.snap_length;
        updated.source_size = scan.offset;
        updated.source_line_count = Some(scan.line_number);
        updated.status = IndexStatus::Fresh;
        persistence::save(&mut updated)?;
        *index = updated;
        report.written = true;

        info!(
            index = %index.index_path().display(),
            source = %index.source_path().display(),
            bytes = report.bytes_indexed,
            lines = report.lines,
            entries = report.entries,
            "Index {}",
            action
        );
        Ok(report)
    }

    /// Scan the source from the last surviving entry to end of file.
    fn scan(&self, index: &Index, mut entries: Vec<CheckpointEntry>) -> Result<ScanState> {
        let opts = &self.options;
        let path = index.source_path();
        let snap = opts.snap_length;

        let file = File::open(path).map_err(|source| LineseekError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let mut stream = BufReader::new(file);
        let mut reader = LineReader::new().with_max_line_length(opts.max_line_length);

        let mut offset = 0u64;
        let mut line_number = 0u64;
        let mut since_checkpoint = 0u64;
        let mut previous: Option<Vec<u8>> = None;

        if let Some(last) = entries.last() {
            // Re-read the line at the last checkpoint to find where scanning resumes
            stream
                .seek(SeekFrom::Start(last.file_offset))
                .map_err(|source| LineseekError::SeekFailed {
                    path: path.to_path_buf(),
                    offset: last.file_offset,
                    source,
                })?;
            reader.set_offset(last.file_offset);
            let line = reader.read_line(&mut stream)?;
            let len = line.len() as u64;
            offset = last.file_offset + len;
            line_number = last.line_number + u64::from(len > 0);
            since_checkpoint = len;
            previous = line.fragment(snap).map(<[u8]>::to_vec);
            debug!(offset, line_number, "Resuming scan");
        }

        let total = index.source_size().saturating_sub(offset);
        let mut scanned = 0u64;
        let mut since_report = 0u64;

        loop {
            let line = reader.read_line(&mut stream)?;
            let fragment = line.fragment(snap);

            if since_checkpoint > 0 && since_checkpoint >= opts.chunk_size {
                entries.push(
                    CheckpointEntry::new(offset, line_number)
                        .with_fragment(fragment.map(<[u8]>::to_vec)),
                );
                since_checkpoint = 0;
            }

            if line.is_empty() {
                break;
            }

            if let Some(frag) = fragment {
                match previous.as_mut() {
                    Some(prev) => {
                        if frag < prev.as_slice() {
                            return Err(LineseekError::UnsortedContentDuringBuild {
                                path: path.to_path_buf(),
                                snap_length: snap,
                                line_number: line_number + 1,
                                fragment: String::from_utf8_lossy(frag).into_owned(),
                                previous: String::from_utf8_lossy(prev).into_owned(),
                            });
                        }
                        prev.clear();
                        prev.extend_from_slice(frag);
                    }
                    None => previous = Some(frag.to_vec()),
                }
            }

            let len = line.len() as u64;
            offset += len;
            line_number += 1;
            since_checkpoint += len;
            scanned += len;
            since_report += len;

            if since_report >= opts.progress_interval {
                if let Some(progress) = &self.progress {
                    progress.on_progress(scanned, total);
                }
                since_report = 0;
            }
        }

        // A checkpoint taken exactly at EOF already marks the end of file
        if since_checkpoint > 0 || index.source_size() == 0 {
            entries.push(CheckpointEntry::new(offset, line_number));
        }

        if let Some(progress) = &self.progress {
            progress.on_complete(scanned, line_number);
        }

        Ok(ScanState {
            entries,
            offset,
            line_number,
        })
    }
}

struct ScanState {
    entries: Vec<CheckpointEntry>,
    offset: u64,
    line_number: u64,
}

/// Build or refresh `index` with `options`.
///
/// Shorthand for `IndexBuilder::new(options.clone()).build(index)`.
pub fn build_or_refresh(index: &mut Index, options: &BuildOptions) -> Result<BuildReport> {
    IndexBuilder::new(options.clone()).build(index)
}

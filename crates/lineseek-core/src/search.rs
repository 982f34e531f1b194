//! Range search over an indexed source file.
//!
//! A search has two phases: a seek to the tightest checkpoint that cannot be
//! past the requested lower bound, then a linear scan that writes matching
//! lines verbatim to a sink. Ranges are either by line number or by content:
//!
//! - **Line ranges** (`start_line`, `end_line`) are 1-based and inclusive.
//! - **Content ranges** (`greater_than`, `less_than`) compare raw line bytes.
//!   They need an index built with a snap length and a source whose lines are
//!   sorted by their leading bytes.
//!
//! The scan stops early at `end_line`, after `max_count` lines, or at the first
//! line whose leading bytes exceed `less_than`.

use crate::error::{LineseekError, Result};
use crate::format::thousands;
use crate::index::Index;
use crate::reader::LineReader;
use crate::types::{truncated_cmp, CheckpointEntry};
use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// A range query over the lines of a source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// First line to output (1-based)
    pub start_line: Option<u64>,

    /// Last line to output (1-based, inclusive)
    pub end_line: Option<u64>,

    /// Lowest line content to output (inclusive)
    pub greater_than: Option<Vec<u8>>,

    /// Content beyond which the scan stops, compared over its own length
    pub less_than: Option<Vec<u8>>,

    /// Maximum number of lines to output
    pub max_count: Option<u64>,

    /// Prefix each line with its line number
    pub with_line_numbers: bool,
}

impl SearchQuery {
    /// A query matching every line.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_line(mut self, line: u64) -> Self {
        self.start_line = Some(line);
        self
    }

    pub fn end_line(mut self, line: u64) -> Self {
        self.end_line = Some(line);
        self
    }

    pub fn greater_than(mut self, bound: impl Into<Vec<u8>>) -> Self {
        self.greater_than = Some(bound.into());
        self
    }

    pub fn less_than(mut self, bound: impl Into<Vec<u8>>) -> Self {
        self.less_than = Some(bound.into());
        self
    }

    pub fn max_count(mut self, count: u64) -> Self {
        self.max_count = Some(count);
        self
    }

    pub fn with_line_numbers(mut self, enabled: bool) -> Self {
        self.with_line_numbers = enabled;
        self
    }

    /// True if the query bounds lines by number
    pub fn is_line_query(&self) -> bool {
        self.start_line.is_some() || self.end_line.is_some()
    }

    /// True if the query bounds lines by content
    pub fn is_content_query(&self) -> bool {
        self.greater_than.is_some() || self.less_than.is_some()
    }

    /// Check that the query is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.is_line_query() && self.is_content_query() {
            return Err(LineseekError::invalid_query(
                "line number bounds cannot be combined with content bounds",
            ));
        }
        if self.start_line == Some(0) || self.end_line == Some(0) {
            return Err(LineseekError::invalid_query("line numbers start at 1"));
        }
        Ok(())
    }

    /// True if the query can match nothing, so no I/O is needed.
    pub fn is_empty_range(&self) -> bool {
        if self.max_count == Some(0) {
            return true;
        }
        if let (Some(start), Some(end)) = (self.start_line, self.end_line) {
            if start > end {
                return true;
            }
        }
        if let (Some(gt), Some(lt)) = (&self.greater_than, &self.less_than) {
            if gt > lt {
                return true;
            }
        }
        false
    }
}

/// Outcome of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchReport {
    /// Lines written to the sink
    pub lines_written: u64,

    /// Offset the scan started from
    pub start_offset: u64,
}

/// Where search output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// `"-"` selects standard output, anything else names a file.
    pub fn parse(value: &str) -> Self {
        if value == "-" {
            OutputTarget::Stdout
        } else {
            OutputTarget::File(PathBuf::from(value))
        }
    }

    /// Open the target for buffered writing, truncating a file target.
    pub fn open(&self) -> Result<Box<dyn Write>> {
        match self {
            OutputTarget::Stdout => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
            OutputTarget::File(path) => {
                let file = File::create(path).map_err(|source| {
                    LineseekError::OutputWriteFailed {
                        target: self.to_string(),
                        source,
                    }
                })?;
                Ok(Box::new(BufWriter::new(file)))
            }
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::Stdout => write!(f, "<stdout>"),
            OutputTarget::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Write the lines of `index`'s source matching `query` to `sink`.
pub fn search<W: Write + ?Sized>(
    index: &Index,
    query: &SearchQuery,
    sink: &mut W,
) -> Result<SearchReport> {
    run(index, query, sink, "output")
}

/// Open `target` and write the matching lines to it.
pub fn search_to(index: &Index, query: &SearchQuery, target: &OutputTarget) -> Result<SearchReport> {
    query.validate()?;
    if query.is_empty_range() {
        debug!("Query range is empty");
        return Ok(SearchReport::default());
    }
    let mut sink = target.open()?;
    run(index, query, &mut sink, &target.to_string())
}

fn run<W: Write + ?Sized>(
    index: &Index,
    query: &SearchQuery,
    sink: &mut W,
    target: &str,
) -> Result<SearchReport> {
    query.validate()?;
    if query.is_empty_range() {
        debug!("Query range is empty");
        return Ok(SearchReport::default());
    }

    if query.is_content_query() && !index.supports_content_search() {
        return Err(LineseekError::invalid_query(format!(
            "index {} was built without a snap length; rebuild it with one for content search",
            index.index_path().display()
        )));
    }

    if let (Some(start), Some(lines)) = (query.start_line, index.source_line_count()) {
        if start > lines {
            info!(
                start_line = start,
                lines,
                path = %index.source_path().display(),
                "Start line is past the end of the file"
            );
        }
    }

    let origin = match (&query.greater_than, query.start_line) {
        (Some(gt), _) => seek_content(index.entries(), gt),
        (None, Some(start)) => seek_line(index.entries(), start),
        (None, None) => None,
    };
    let (start_offset, mut line_number) =
        origin.map_or((0, 0), |entry| (entry.file_offset, entry.line_number));
    debug!(offset = start_offset, line_number, "Starting scan");

    let path = index.source_path();
    let file = File::open(path).map_err(|source| LineseekError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let mut stream = BufReader::new(file);
    stream
        .seek(SeekFrom::Start(start_offset))
        .map_err(|source| LineseekError::SeekFailed {
            path: path.to_path_buf(),
            offset: start_offset,
            source,
        })?;
    let mut reader = LineReader::new();
    reader.set_offset(start_offset);

    let write_failed = |source: io::Error| LineseekError::OutputWriteFailed {
        target: target.to_string(),
        source,
    };

    let mut written = 0u64;
    loop {
        if query.end_line.is_some_and(|end| line_number >= end) {
            break;
        }
        if query.max_count.is_some_and(|max| written >= max) {
            break;
        }

        let line = reader.read_line(&mut stream)?;
        if line.is_empty() {
            break;
        }
        let bytes = line.bytes();

        if let Some(lt) = &query.less_than {
            let n = bytes.len().min(lt.len());
            if &bytes[..n] > lt.as_slice() {
                break;
            }
        }

        line_number += 1;
        if query.start_line.is_some_and(|start| line_number < start) {
            continue;
        }
        if let Some(gt) = &query.greater_than {
            if bytes < gt.as_slice() {
                continue;
            }
        }

        if query.with_line_numbers {
            write!(sink, "{}: ", thousands(line_number)).map_err(write_failed)?;
        }
        sink.write_all(bytes).map_err(write_failed)?;
        written += 1;
    }
    sink.flush().map_err(write_failed)?;

    debug!(lines = written, "Search complete");
    Ok(SearchReport {
        lines_written: written,
        start_offset,
    })
}

/// Last entry preceding line `start` (1-based).
fn seek_line(entries: &[CheckpointEntry], start: u64) -> Option<&CheckpointEntry> {
    entries
        .iter()
        .take_while(|entry| entry.line_number < start)
        .last()
}

/// Last entry whose fragment sorts strictly below `greater_than`.
///
/// Only the common prefix of the bound and each fragment is compared, so an
/// entry whose fragment ties with the bound is not safe to start from.
fn seek_content<'a>(entries: &'a [CheckpointEntry], greater_than: &[u8]) -> Option<&'a CheckpointEntry> {
    let mut found = None;
    for entry in entries {
        let Some(fragment) = entry.fragment() else {
            break;
        };
        if truncated_cmp(greater_than, fragment) != Ordering::Greater {
            break;
        }
        found = Some(entry);
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{build_or_refresh, BuildOptions};
    use crate::persistence;
    use std::fs;
    use tempfile::TempDir;

    fn indexed(contents: &[u8], chunk_size: u64, snap_length: usize) -> (TempDir, Index) {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.txt");
        fs::write(&source, contents).unwrap();
        let mut index = persistence::load(&source, &dir.path().join("data.lsidx")).unwrap();
        build_or_refresh(&mut index, &BuildOptions::new(chunk_size, snap_length)).unwrap();
        (dir, index)
    }

    fn ten_lines() -> Vec<u8> {
        (1..=10)
            .map(|i| format!("line{:02}\n", i))
            .collect::<String>()
            .into_bytes()
    }

    fn sorted_words() -> Vec<u8> {
        b"apple\napricot\nbanana\nblueberry\ncherry\ndate\nfig\ngrape\nkiwi\nlemon\n".to_vec()
    }

    fn run_query(index: &Index, query: &SearchQuery) -> (String, SearchReport) {
        let mut out = Vec::new();
        let report = search(index, query, &mut out).unwrap();
        (String::from_utf8(out).unwrap(), report)
    }

    #[test]
    fn test_line_range() {
        let (_dir, index) = indexed(&ten_lines(), 14, 0);
        let (out, report) = run_query(&index, &SearchQuery::new().start_line(3).end_line(5));
        assert_eq!(out, "line03\nline04\nline05\n");
        assert_eq!(report.lines_written, 3);
        // (14, 2) is the tightest checkpoint before line 3
        assert_eq!(report.start_offset, 14);
    }

    #[test]
    fn test_line_range_from_every_checkpoint() {
        let data = ten_lines();
        for chunk in [1u64, 7, 21, 1000] {
            let (_dir, index) = indexed(&data, chunk, 0);
            for start in 1..=10u64 {
                let (out, _) = run_query(&index, &SearchQuery::new().start_line(start).max_count(1));
                assert_eq!(out, format!("line{:02}\n", start), "chunk {chunk}");
            }
        }
    }

    #[test]
    fn test_open_ended_ranges() {
        let (_dir, index) = indexed(&ten_lines(), 14, 0);
        let (out, _) = run_query(&index, &SearchQuery::new().start_line(9));
        assert_eq!(out, "line09\nline10\n");

        let (out, _) = run_query(&index, &SearchQuery::new().end_line(2));
        assert_eq!(out, "line01\nline02\n");

        let (out, _) = run_query(&index, &SearchQuery::new());
        assert_eq!(out.as_bytes(), &ten_lines()[..]);
    }

    #[test]
    fn test_start_past_end() {
        let (_dir, index) = indexed(&ten_lines(), 14, 0);
        let (out, report) = run_query(&index, &SearchQuery::new().start_line(50));
        assert!(out.is_empty());
        assert_eq!(report.lines_written, 0);
    }

    #[test]
    fn test_empty_ranges_succeed() {
        let (_dir, index) = indexed(&sorted_words(), 14, 3);
        for query in [
            SearchQuery::new().max_count(0),
            SearchQuery::new().start_line(5).end_line(3),
            SearchQuery::new().greater_than("b").less_than("a"),
        ] {
            let (out, report) = run_query(&index, &query);
            assert!(out.is_empty());
            assert_eq!(report, SearchReport::default());
        }
    }

    #[test]
    fn test_max_count() {
        let (_dir, index) = indexed(&ten_lines(), 14, 0);
        let (out, _) = run_query(&index, &SearchQuery::new().start_line(4).max_count(2));
        assert_eq!(out, "line04\nline05\n");
    }

    #[test]
    fn test_line_numbers() {
        let data: Vec<u8> = (0..1002).flat_map(|_| b"x\n".to_vec()).collect();
        let (_dir, index) = indexed(&data, 100, 0);
        let (out, _) = run_query(
            &index,
            &SearchQuery::new()
                .start_line(999)
                .end_line(1001)
                .with_line_numbers(true),
        );
        assert_eq!(out, "999: x\n1,000: x\n1,001: x\n");
    }

    #[test]
    fn test_content_range() {
        let (_dir, index) = indexed(&sorted_words(), 10, 2);
        let (out, _) = run_query(&index, &SearchQuery::new().greater_than("b").less_than("c"));
        assert_eq!(out, "banana\nblueberry\ncherry\n");

        let (out, _) = run_query(&index, &SearchQuery::new().greater_than("blu").less_than("d"));
        assert_eq!(out, "blueberry\ncherry\ndate\n");
    }

    #[test]
    fn test_content_lower_bound_only() {
        let (_dir, index) = indexed(&sorted_words(), 10, 2);
        let (out, _) = run_query(&index, &SearchQuery::new().greater_than("grape"));
        assert_eq!(out, "grape\nkiwi\nlemon\n");

        let (out, _) = run_query(&index, &SearchQuery::new().greater_than("zzz"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_content_upper_bound_only() {
        let (_dir, index) = indexed(&sorted_words(), 10, 2);
        let (out, report) = run_query(&index, &SearchQuery::new().less_than("apr"));
        assert_eq!(out, "apple\napricot\n");
        assert_eq!(report.start_offset, 0);
    }

    #[test]
    fn test_content_bound_ties_with_fragment() {
        // Every fragment is "aa", so the scan must start from the beginning
        let data = b"aa1\naa2\naa3\naa4\naa5\naa6\n";
        let (_dir, index) = indexed(data, 4, 2);
        let (out, report) = run_query(&index, &SearchQuery::new().greater_than("aa2").max_count(2));
        assert_eq!(out, "aa2\naa3\n");
        assert_eq!(report.start_offset, 0);
    }

    #[test]
    fn test_content_seek_skips_ahead() {
        let (_dir, index) = indexed(&sorted_words(), 10, 2);
        let (_, report) = run_query(&index, &SearchQuery::new().greater_than("kiwi"));
        assert!(report.start_offset > 0);
    }

    #[test]
    fn test_content_query_without_fragments() {
        let (_dir, index) = indexed(&sorted_words(), 10, 0);
        let mut out = Vec::new();
        let err = search(&index, &SearchQuery::new().greater_than("b"), &mut out).unwrap_err();
        assert!(matches!(err, LineseekError::InvalidQuery { .. }));
    }

    #[test]
    fn test_mixed_bounds_rejected() {
        let (_dir, index) = indexed(&sorted_words(), 10, 2);
        let mut out = Vec::new();
        let err = search(
            &index,
            &SearchQuery::new().start_line(1).greater_than("b"),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, LineseekError::InvalidQuery { .. }));
    }

    #[test]
    fn test_zero_line_rejected() {
        assert!(SearchQuery::new().start_line(0).validate().is_err());
        assert!(SearchQuery::new().end_line(0).validate().is_err());
        assert!(SearchQuery::new().start_line(1).end_line(1).validate().is_ok());
    }

    #[test]
    fn test_empty_file() {
        let (_dir, index) = indexed(b"", 10, 0);
        let (out, _) = run_query(&index, &SearchQuery::new().start_line(1));
        assert!(out.is_empty());
    }

    #[test]
    fn test_unterminated_last_line() {
        let (_dir, index) = indexed(b"a\nb\nc", 2, 0);
        let (out, _) = run_query(&index, &SearchQuery::new().start_line(3));
        assert_eq!(out, "c");
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure() {
        let (_dir, index) = indexed(&ten_lines(), 14, 0);
        let err = search(&index, &SearchQuery::new(), &mut FailingSink).unwrap_err();
        assert!(matches!(err, LineseekError::OutputWriteFailed { .. }));
    }

    #[test]
    fn test_output_target() {
        assert_eq!(OutputTarget::parse("-"), OutputTarget::Stdout);
        assert_eq!(
            OutputTarget::parse("out.txt"),
            OutputTarget::File(PathBuf::from("out.txt"))
        );
    }

    #[test]
    fn test_search_to_file() {
        let (dir, index) = indexed(&ten_lines(), 14, 0);
        let out_path = dir.path().join("out.txt");
        let target = OutputTarget::File(out_path.clone());
        let report = search_to(&index, &SearchQuery::new().start_line(10), &target).unwrap();
        assert_eq!(report.lines_written, 1);
        assert_eq!(fs::read_to_string(&out_path).unwrap(), "line10\n");
    }
}

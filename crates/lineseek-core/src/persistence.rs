//! Persistence layer for lineseek indexes.
//!
//! This module loads an index file into an [`Index`], classifying it against
//! the current state of the source file, and writes indexes back to disk.
//!
//! ## Index File Format
//!
//! The index file is plain text, one record per line:
//!
//! ```text
//! <absolute source path>
//! <mtime> <size> <line_count> <chunk_size> <snap_length> <entry_count>
//! <file_offset> <line_number>[ <fragment>]
//! ... (entry_count lines)
//! ```
//!
//! `mtime` keeps six decimal places. `fragment` is the raw leading bytes of
//! the line at `file_offset` and is absent on the terminal entry.
//!
//! ## Atomic writes
//!
//! The complete file is rendered in memory, written to a sibling temporary
//! file and renamed over the old index, so a reader never observes a partially
//! written index.

use crate::error::{LineseekError, Result};
use crate::index::Index;
use crate::reader::LineReader;
use crate::types::{CheckpointEntry, FileStat};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Parsed second header line.
#[derive(Debug, Clone, PartialEq)]
struct IndexHeader {
    mtime: f64,
    size: u64,
    line_count: u64,
    chunk_size: u64,
    snap_length: usize,
    entry_count: usize,
}

impl IndexHeader {
    fn parse(line: &[u8], path: &Path) -> Result<Self> {
        let text = std::str::from_utf8(line)
            .map_err(|_| LineseekError::malformed(path, "header is not valid UTF-8"))?;
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(LineseekError::malformed(
                path,
                format!(
                    "line not of form (mtime, size, lines, chunk_size, snap_length, entry_count): {:?}",
                    text.trim_end()
                ),
            ));
        }

        let mtime: f64 = fields[0]
            .parse()
            .map_err(|_| LineseekError::malformed(path, format!("bad mtime {:?}", fields[0])))?;
        if !mtime.is_finite() {
            return Err(LineseekError::malformed(path, format!("bad mtime {:?}", fields[0])));
        }

        Ok(IndexHeader {
            mtime,
            size: parse_field(fields[1], "size", path)?,
            line_count: parse_field(fields[2], "line count", path)?,
            chunk_size: parse_field(fields[3], "chunk size", path)?,
            snap_length: parse_field(fields[4], "snap length", path)?,
            entry_count: parse_field(fields[5], "entry count", path)?,
        })
    }
}

fn parse_field<T: std::str::FromStr>(field: &str, name: &str, path: &Path) -> Result<T> {
    field
        .parse()
        .map_err(|_| LineseekError::malformed(path, format!("bad {} {:?}", name, field)))
}

fn strip_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

/// Raw bytes of a path as stored on the first line of an index file.
#[cfg(unix)]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().into()
}

#[cfg(not(unix))]
fn path_bytes(path: &Path) -> std::borrow::Cow<'_, [u8]> {
    match path.to_string_lossy() {
        std::borrow::Cow::Borrowed(s) => s.as_bytes().into(),
        std::borrow::Cow::Owned(s) => s.into_bytes().into(),
    }
}

#[cfg(unix)]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsStr::new(&*String::from_utf8_lossy(bytes)))
}

/// Load the index for `source_path` from `index_path`.
///
/// A missing index file is not an error: the returned index has status
/// [`IndexStatus::Absent`] and no entries.
pub fn load(source_path: &Path, index_path: &Path) -> Result<Index> {
    let source = FileStat::of(source_path).map_err(|source| LineseekError::SourceUnreadable {
        path: source_path.to_path_buf(),
        source,
    })?;
    let mut index = Index::new(source_path, index_path, source);

    if !index_path.exists() {
        debug!(path = %index_path.display(), "Index file not found");
        return Ok(index);
    }

    let index_stat = FileStat::of(index_path)?;
    index.index_file_size = Some(index_stat.size);
    index.index_mtime = Some(index_stat.mtime);

    debug!(path = %index_path.display(), "Loading index");
    let file = File::open(index_path)?;
    let mut stream = BufReader::new(file);
    let mut reader = LineReader::new();

    // Source path line
    let line = reader.read_line(&mut stream)?;
    if line.is_empty() {
        return Err(LineseekError::malformed(index_path, "EOF reading file name"));
    }
    let stored = strip_newline(line.bytes());
    if stored != &*path_bytes(source_path) {
        return Err(LineseekError::IndexHeaderMismatch {
            index: index_path.to_path_buf(),
            found: path_from_bytes(stored),
            expected: source_path.to_path_buf(),
        });
    }

    // Stats line
    let line = reader.read_line(&mut stream)?;
    if line.is_empty() {
        return Err(LineseekError::malformed(index_path, "EOF reading header stats"));
    }
    let header = IndexHeader::parse(strip_newline(line.bytes()), index_path)?;
    index.chunk_size = header.chunk_size;
    index.snap_length = header.snap_length;

    // Entries. The count is untrusted, so the vector grows as lines are read
    let mut entries = Vec::new();
    for n in 0..header.entry_count {
        let line = reader.read_line(&mut stream)?;
        if line.is_empty() {
            return Err(LineseekError::malformed(
                index_path,
                format!("EOF after {} of {} entries", n, header.entry_count),
            ));
        }
        entries.push(parse_entry(
            strip_newline(line.bytes()),
            header.snap_length,
            n + 1,
            index_path,
        )?);
    }
    index.entries = entries;
    index.classify();

    debug!(
        path = %index_path.display(),
        status = %index.status,
        entries = index.entries.len(),
        indexed_mtime = header.mtime,
        indexed_size = header.size,
        indexed_lines = header.line_count,
        "Index loaded"
    );

    Ok(index)
}

fn parse_entry(line: &[u8], snap_length: usize, n: usize, path: &Path) -> Result<CheckpointEntry> {
    let malformed = || {
        LineseekError::malformed(
            path,
            format!(
                "entry line {} not of form (offset, line number, ...): {:?}",
                n,
                String::from_utf8_lossy(line)
            ),
        )
    };

    let mut parts = line.splitn(3, |&b| b == b' ');
    let offset = parts.next().ok_or_else(malformed)?;
    let line_number = parts.next().ok_or_else(malformed)?;
    let rest = parts.next();

    let file_offset: u64 = std::str::from_utf8(offset)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;
    let line_number: u64 = std::str::from_utf8(line_number)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(malformed)?;

    let fragment = match rest {
        Some(frag) if snap_length > 0 => {
            if frag.len() > snap_length {
                return Err(LineseekError::malformed(
                    path,
                    format!(
                        "entry line {} has fragment of {} bytes, snap length is {}",
                        n,
                        frag.len(),
                        snap_length
                    ),
                ));
            }
            Some(frag.to_vec())
        }
        _ => None,
    };

    Ok(CheckpointEntry {
        file_offset,
        line_number,
        fragment,
    })
}

/// Render the full index file contents.
pub fn render(index: &Index) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + index.entries.len() * (24 + index.snap_length));
    out.extend_from_slice(&path_bytes(&index.source_path));
    out.push(b'\n');
    out.extend_from_slice(
        format!(
            "{:.6} {} {} {} {} {}\n",
            index.source_mtime,
            index.source_size,
            index.source_line_count.unwrap_or(0),
            index.chunk_size,
            index.snap_length,
            index.entries.len()
        )
        .as_bytes(),
    );
    for entry in &index.entries {
        out.extend_from_slice(format!("{} {}", entry.file_offset, entry.line_number).as_bytes());
        if let Some(frag) = &entry.fragment {
            out.push(b' ');
            out.extend_from_slice(frag);
        }
        out.push(b'\n');
    }
    out
}

fn temp_path(index_path: &Path) -> PathBuf {
    let mut name = index_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    index_path.with_file_name(name)
}

/// Write the index to its index path.
///
/// The whole file is rendered first, written to a temporary sibling and then
/// renamed into place. On success the index file size and mtime are refreshed
/// from disk.
pub fn save(index: &mut Index) -> Result<()> {
    let contents = render(index);
    let index_path = index.index_path.clone();
    let unwritable = |source: io::Error| LineseekError::IndexUnwritable {
        path: index_path.clone(),
        source,
    };

    let temp = temp_path(&index_path);
    let written = (|| -> io::Result<()> {
        let file = File::create(&temp)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&contents)?;
        writer.flush()?;
        Ok(())
    })();
    if let Err(e) = written.and_then(|_| fs::rename(&temp, &index_path)) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %cleanup, "Failed to remove temporary index file");
            }
        }
        return Err(unwritable(e));
    }

    let stat = FileStat::of(&index_path).map_err(unwritable)?;
    index.index_file_size = Some(stat.size);
    index.index_mtime = Some(stat.mtime);

    info!(
        path = %index_path.display(),
        entries = index.entries.len(),
        bytes = contents.len(),
        "Index saved"
    );
    Ok(())
}

/// Delete an index file.
///
/// Returns `false` if there was nothing to delete.
pub fn delete_index(index_path: &Path) -> Result<bool> {
    match fs::remove_file(index_path) {
        Ok(()) => {
            info!(path = %index_path.display(), "Index deleted");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

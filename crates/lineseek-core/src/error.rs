//! Error types for lineseek core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while the command-line binary uses `anyhow` for
//! convenient error handling and context.
//!
//! A missing index file is not an error: it is reported through
//! [`IndexStatus::Absent`](crate::types::IndexStatus::Absent).

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using LineseekError
pub type Result<T> = std::result::Result<T, LineseekError>;

/// Core error types for lineseek operations.
#[derive(Error, Debug)]
pub enum LineseekError {
    // === Index File Errors ===
    /// The index file was built for a different source file
    #[error("name mismatch: index {index} has {found} for file {expected}")]
    IndexHeaderMismatch {
        index: PathBuf,
        found: PathBuf,
        expected: PathBuf,
    },

    /// The index file header or an entry line could not be parsed
    #[error("malformed index {path}: {reason}")]
    IndexMalformed { path: PathBuf, reason: String },

    /// The index file could not be written
    #[error("cannot write index file {path}: {source}")]
    IndexUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    // === Source File Errors ===
    /// The source file could not be opened or read
    #[error("cannot read data file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The source file got smaller while it was being indexed
    #[error("file {path} was originally {expected} bytes but shrank to {actual} while indexing it")]
    SourceShrankDuringBuild {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    /// Content search was requested but the source is not sorted on its leading bytes
    #[error(
        "unordered data in {path} with snap length {snap_length}: leading bytes of line {line_number} \
         ({fragment:?}) are less than those of the previous line ({previous:?})"
    )]
    UnsortedContentDuringBuild {
        path: PathBuf,
        snap_length: usize,
        line_number: u64,
        fragment: String,
        previous: String,
    },

    /// Seeking within the source file failed
    #[error("error seeking to position {offset} in file {path}: {source}")]
    SeekFailed {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// A line exceeded the configured maximum length
    #[error("line starting at offset {offset} exceeds maximum line length of {limit} bytes")]
    LineTooLong { offset: u64, limit: usize },

    /// The path is not a regular file that can be indexed
    #[error("not a regular file that can be indexed: {path}")]
    NotARegularFile { path: PathBuf },

    /// An index directory does not exist or is not a directory
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    // === Output Errors ===
    /// Writing search output failed or was short
    #[error("error writing to output {target}: {source}")]
    OutputWriteFailed {
        target: String,
        #[source]
        source: io::Error,
    },

    // === Query Errors ===
    /// The query cannot be answered with the given bounds or index
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl LineseekError {
    /// Returns true if deleting and rebuilding the index would clear this error
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            LineseekError::IndexHeaderMismatch { .. } | LineseekError::IndexMalformed { .. }
        )
    }

    /// Create a malformed-index error
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        LineseekError::IndexMalformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-query error
    pub fn invalid_query(reason: impl Into<String>) -> Self {
        LineseekError::InvalidQuery {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_rebuild() {
        let err = LineseekError::malformed("/tmp/x.lsidx", "bad header");
        assert!(err.requires_rebuild());

        let err = LineseekError::IndexHeaderMismatch {
            index: PathBuf::from("/tmp/x.lsidx"),
            found: PathBuf::from("/data/a.log"),
            expected: PathBuf::from("/data/b.log"),
        };
        assert!(err.requires_rebuild());

        let err = LineseekError::invalid_query("both bounds");
        assert!(!err.requires_rebuild());
    }

    #[test]
    fn test_display() {
        let err = LineseekError::SourceShrankDuringBuild {
            path: PathBuf::from("/data/a.log"),
            expected: 100,
            actual: 40,
        };
        assert_eq!(
            err.to_string(),
            "file /data/a.log was originally 100 bytes but shrank to 40 while indexing it"
        );
    }
}

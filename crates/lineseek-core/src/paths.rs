//! Locating index files and validating source paths.
//!
//! Every source file has one index path. By default it lives in a shared
//! directory and is named after a SHA-256 digest of the source's absolute path,
//! so files with the same name in different directories never collide.

use crate::error::{LineseekError, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Extension appended to every index file name
pub const INDEX_SUFFIX: &str = ".lsidx";

/// Prefix of digest-based index file names
pub const HASH_PREFIX: &str = "f_";

/// Where index files are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexDirPolicy {
    /// Next to the source file
    SameAsSource,
    /// In a fixed directory
    Directory(PathBuf),
}

impl IndexDirPolicy {
    /// Interpret a directory setting. `"."` means next to the source file.
    pub fn parse(value: &str) -> Self {
        if value == "." {
            IndexDirPolicy::SameAsSource
        } else {
            IndexDirPolicy::Directory(PathBuf::from(value))
        }
    }

    /// The directory holding the index for `source`
    pub fn directory_for(&self, source: &Path) -> PathBuf {
        match self {
            IndexDirPolicy::SameAsSource => source
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            IndexDirPolicy::Directory(dir) => dir.clone(),
        }
    }
}

impl fmt::Display for IndexDirPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDirPolicy::SameAsSource => write!(f, "."),
            IndexDirPolicy::Directory(dir) => write!(f, "{}", dir.display()),
        }
    }
}

/// Converts bytes to a lowercase hexadecimal string.
pub fn hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

/// Compute the index path for an absolute source path.
///
/// The file name is the source's own name when `full_name` is set, otherwise
/// `f_` followed by the hex SHA-256 of the source path. A `.` prefix hides it
/// when `hidden` is set.
pub fn derive_index_path(
    source: &Path,
    policy: &IndexDirPolicy,
    hidden: bool,
    full_name: bool,
) -> PathBuf {
    let base = match source.file_name() {
        Some(name) if full_name => name.to_string_lossy().into_owned(),
        _ => {
            let digest = Sha256::digest(source.to_string_lossy().as_bytes());
            format!("{}{}", HASH_PREFIX, hex(&digest))
        }
    };
    let prefix = if hidden { "." } else { "" };
    policy
        .directory_for(source)
        .join(format!("{}{}{}", prefix, base, INDEX_SUFFIX))
}

/// Fail unless `dir` exists and is a directory.
pub fn check_index_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(LineseekError::NotADirectory {
            path: dir.to_path_buf(),
        }),
    }
}

/// Resolve `path` to an absolute, readable regular file.
pub fn resolve_source(path: &Path) -> Result<PathBuf> {
    let unreadable = |source| LineseekError::SourceUnreadable {
        path: path.to_path_buf(),
        source,
    };
    let resolved = fs::canonicalize(path).map_err(unreadable)?;
    let meta = fs::metadata(&resolved).map_err(unreadable)?;
    if !meta.is_file() {
        return Err(LineseekError::NotARegularFile { path: resolved });
    }
    File::open(&resolved).map_err(unreadable)?;
    Ok(resolved)
}

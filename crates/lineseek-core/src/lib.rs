//! # lineseek Core Library
//!
//! This crate provides the sparse line index at the heart of lineseek: it
//! records a checkpoint every `chunk_size` bytes of a huge text file so that a
//! range of lines can be located without reading the file from the start.
//!
//! ## Architecture
//!
//! - **Reader** (`reader`): Line reading with a reusable buffer
//! - **Types** (`types`): Checkpoint entries and index status
//! - **Index** (`index`): In-memory index and its validity classification
//! - **Persistence** (`persistence`): Text index file loading and atomic saving
//! - **Builder** (`builder`): Creating and incrementally refreshing indexes
//! - **Search** (`search`): Line-number and content range queries
//! - **Paths** (`paths`): Index file naming and source validation
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use lineseek_core::{build_or_refresh, search, BuildOptions, Index, SearchQuery};
//!
//! let mut index = Index::load(source, index_path)?;
//! build_or_refresh(&mut index, &BuildOptions::default())?;
//!
//! let query = SearchQuery::new().start_line(1_000_000).end_line(1_000_010);
//! search(&index, &query, &mut std::io::stdout())?;
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod format;
pub mod index;
pub mod paths;
pub mod persistence;
pub mod reader;
pub mod search;
pub mod types;

// Re-export commonly used types
pub use builder::{
    build_or_refresh, BuildAction, BuildOptions, BuildProgress, BuildReport, IndexBuilder,
    LoggingProgress,
};
pub use config::Config;
pub use error::{LineseekError, Result};
pub use index::Index;
pub use paths::{derive_index_path, IndexDirPolicy};
pub use persistence::delete_index;
pub use search::{search, search_to, OutputTarget, SearchQuery, SearchReport};
pub use types::{CheckpointEntry, FileStat, IndexStatus};

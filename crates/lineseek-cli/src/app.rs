//! Application state and per-file index resolution.

use crate::{BuildArgs, IndexLocation};
use anyhow::{bail, Context};
use lineseek_core::paths::{check_index_dir, resolve_source};
use lineseek_core::{derive_index_path, BuildOptions, Config, Index, IndexDirPolicy};
use std::path::PathBuf;
use tracing::debug;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Write no index files
    pub dry_run: bool,

    /// Suppress normal output
    pub quiet: bool,
}

/// A data file paired with the location of its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    /// Absolute path of the data file
    pub source: PathBuf,

    /// Where its index lives
    pub index_path: PathBuf,
}

impl FileContext {
    /// Load the index, classifying it against the data file.
    pub fn load(&self) -> anyhow::Result<Index> {
        Index::load(&self.source, &self.index_path)
            .with_context(|| format!("Failed to load index for {}", self.source.display()))
    }
}

impl App {
    pub fn new(config: Config, dry_run: bool, quiet: bool) -> Self {
        App {
            config,
            dry_run,
            quiet,
        }
    }

    /// Resolve every data file and its index path, failing on the first bad one.
    pub fn resolve(
        &self,
        files: &[PathBuf],
        location: &IndexLocation,
    ) -> anyhow::Result<Vec<FileContext>> {
        if location.index.is_some() && files.len() > 1 {
            bail!("an explicit index file (-i) can only be used with a single data file");
        }

        let full_name = location.full_name || self.config.index.full_name;
        let hidden = location.hidden || self.config.index.hidden;
        let policy = match (&location.index_dir, full_name) {
            (Some(dir), true) if dir != "." => {
                bail!("full-name indexes (-F) must be stored next to the data file (-D .)")
            }
            (_, true) => IndexDirPolicy::SameAsSource,
            (Some(dir), false) => IndexDirPolicy::parse(dir),
            (None, false) => self.config.index_dir_policy(),
        };
        if let IndexDirPolicy::Directory(dir) = &policy {
            check_index_dir(dir).context("Index directory is not usable")?;
        }

        let mut contexts = Vec::with_capacity(files.len());
        for file in files {
            let source = resolve_source(file)?;
            let index_path = match &location.index {
                Some(explicit) => {
                    if let Some(parent) = explicit.parent().filter(|p| !p.as_os_str().is_empty()) {
                        check_index_dir(parent).context("Index directory is not usable")?;
                    }
                    explicit.clone()
                }
                None => derive_index_path(&source, &policy, hidden, full_name),
            };
            debug!(
                source = %source.display(),
                index = %index_path.display(),
                "Resolved index location"
            );
            contexts.push(FileContext { source, index_path });
        }
        Ok(contexts)
    }

    /// Build options from config, overridden by command-line flags.
    ///
    /// An existing index keeps its own chunk size and snap length unless the
    /// flags ask for different ones.
    pub fn build_options(
        &self,
        args: &BuildArgs,
        existing: Option<&Index>,
    ) -> anyhow::Result<BuildOptions> {
        let mut options = self.config.build_options().force(args.force).dry_run(self.dry_run);
        if let Some(index) = existing.filter(|index| index.exists()) {
            options.chunk_size = index.chunk_size();
            options.snap_length = index.snap_length();
        }
        if let Some(chunk_size) = args.chunk_size {
            options.chunk_size = chunk_size;
        }
        if let Some(snap_length) = args.snap_length {
            options.snap_length = snap_length;
        }
        options.validate()?;
        Ok(options)
    }

    /// Reject flag and config combinations that could never build an index.
    ///
    /// Runs before any file is touched so a bad `-C`/`-P` fails fast.
    pub fn validate_build_args(&self, args: &BuildArgs) -> anyhow::Result<()> {
        self.build_options(args, None)?;
        Ok(())
    }

    /// Print a line of normal output unless running quietly.
    pub fn say(&self, message: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", message.as_ref());
        }
    }
}

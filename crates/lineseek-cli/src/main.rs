//! # lineseek CLI
//!
//! Command-line interface for lineseek: build sparse line indexes over huge
//! text files and pull line ranges out of them without reading from the start.
//!
//! ## Commands
//!
//! - `lineseek build <FILE>...` - Create or refresh indexes
//! - `lineseek search <FILE>` - Print a range of lines by number or content
//! - `lineseek list <FILE>...` - Show index status and statistics
//! - `lineseek delete <FILE>...` - Remove indexes
//!
//! ## Example Usage
//!
//! ```bash
//! # Index a log with a checkpoint every 4 MB
//! lineseek build -C 4000000 /var/log/huge.log
//!
//! # Print lines 1,000,000 to 1,000,020 with line numbers
//! lineseek search -S 1000000 -E 1000020 -n /var/log/huge.log
//!
//! # Content range over a sorted file (index keeps 10 leading bytes)
//! lineseek search -P 10 -G 2024-05-01 -L 2024-05-02 sorted.log
//! ```

mod app;
mod commands;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// lineseek - Random access to lines of huge text files
#[derive(Parser)]
#[command(name = "lineseek")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Check everything but write no index files
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the index for each file lives.
#[derive(Args, Debug, Clone, Default)]
pub struct IndexLocation {
    /// Explicit index file (single data file only)
    #[arg(short = 'i', long)]
    pub index: Option<PathBuf>,

    /// Directory for index files ("." = next to the data file)
    #[arg(short = 'D', long)]
    pub index_dir: Option<String>,

    /// Prefix index file names with a dot
    #[arg(short = 'H', long)]
    pub hidden: bool,

    /// Name the index after the data file (implies -D .)
    #[arg(short = 'F', long)]
    pub full_name: bool,
}

/// Options that shape a new or refreshed index.
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Rebuild the index from scratch
    #[arg(short, long)]
    pub force: bool,

    /// Leading bytes of each checkpoint line to keep (enables content search)
    #[arg(short = 'P', long)]
    pub snap_length: Option<usize>,

    /// Bytes between checkpoints
    #[arg(short = 'C', long)]
    pub chunk_size: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or refresh indexes
    Build {
        /// Data files to index
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        location: IndexLocation,
    },

    /// Print a range of lines, refreshing the index first
    #[command(alias = "s")]
    Search {
        /// Data file to search
        file: PathBuf,

        /// First line to print (1-based)
        #[arg(
            short = 'S',
            long,
            value_parser = clap::value_parser!(u64).range(1..),
            conflicts_with_all = ["greater_than", "less_than"]
        )]
        start_line: Option<u64>,

        /// Last line to print (inclusive)
        #[arg(
            short = 'E',
            long,
            value_parser = clap::value_parser!(u64).range(1..),
            conflicts_with_all = ["greater_than", "less_than"]
        )]
        end_line: Option<u64>,

        /// Print lines sorting at or above this value
        #[arg(short = 'G', long)]
        greater_than: Option<String>,

        /// Stop at the first line whose leading bytes sort above this value
        #[arg(short = 'L', long)]
        less_than: Option<String>,

        /// Print at most this many lines
        #[arg(short = 'N', long)]
        max_count: Option<u64>,

        /// Output file ("-" = standard output)
        #[arg(short, long, default_value = "-")]
        output: String,

        /// Prefix lines with their line number
        #[arg(short = 'n', long)]
        line_numbers: bool,

        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        location: IndexLocation,
    },

    /// Show index status and statistics
    #[command(alias = "ls")]
    List {
        /// Data files to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: OutputFormat,

        #[command(flatten)]
        location: IndexLocation,
    },

    /// Delete indexes
    #[command(alias = "rm")]
    Delete {
        /// Data files whose indexes should be removed
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        location: IndexLocation,
    },
}

#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => lineseek_core::Config::load_from(path)?,
        None => lineseek_core::Config::load()?,
    };

    // Setup logging
    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.general.log_level.as_str(),
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .init();

    let app = app::App::new(config, cli.dry_run, cli.quiet);
    let verbose = cli.verbose > 0;

    // Execute command
    match cli.command {
        Commands::Build {
            files,
            build,
            location,
        } => commands::build::run(&app, &files, &build, &location),
        Commands::Search {
            file,
            start_line,
            end_line,
            greater_than,
            less_than,
            max_count,
            output,
            line_numbers,
            build,
            location,
        } => {
            let mut query = lineseek_core::SearchQuery::new().with_line_numbers(line_numbers);
            query.start_line = start_line;
            query.end_line = end_line;
            query.greater_than = greater_than.map(String::into_bytes);
            query.less_than = less_than.map(String::into_bytes);
            query.max_count = max_count;
            commands::search::run(&app, &file, query, &output, &build, &location)
        }
        Commands::List {
            files,
            format,
            location,
        } => commands::list::run(&app, &files, format, verbose, &location),
        Commands::Delete { files, location } => commands::delete::run(&app, &files, &location),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from([
            "lineseek", "-v", "search", "-S", "3", "-E", "5", "-n", "-D", ".", "data.txt",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Search {
                start_line,
                end_line,
                line_numbers,
                location,
                ..
            } => {
                assert_eq!(start_line, Some(3));
                assert_eq!(end_line, Some(5));
                assert!(line_numbers);
                assert_eq!(location.index_dir.as_deref(), Some("."));
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_cli_rejects_mixed_bounds() {
        let result = Cli::try_parse_from(["lineseek", "search", "-S", "3", "-G", "b", "data.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_rejects_zero_line() {
        let result = Cli::try_parse_from(["lineseek", "search", "-S", "0", "data.txt"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_build_requires_files() {
        assert!(Cli::try_parse_from(["lineseek", "build"]).is_err());
        let cli =
            Cli::try_parse_from(["lineseek", "--dry-run", "build", "-f", "-P", "4", "a", "b"])
                .unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Build { files, build, .. } => {
                assert_eq!(files.len(), 2);
                assert!(build.force);
                assert_eq!(build.snap_length, Some(4));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn test_output_format() {
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}

//! List command - show index status and statistics.

use crate::app::App;
use crate::{IndexLocation, OutputFormat};
use chrono::{DateTime, Local, TimeZone};
use lineseek_core::format::{human_bytes, thousands};
use lineseek_core::Index;
use serde::Serialize;
use std::path::PathBuf;

/// One index as shown by `list`.
#[derive(Debug, Serialize)]
pub struct IndexListing {
    pub source: PathBuf,
    pub source_size: u64,
    pub source_modified: Option<DateTime<Local>>,
    pub index: PathBuf,
    pub status: String,
    pub description: String,
    pub index_size: Option<u64>,
    pub index_modified: Option<DateTime<Local>>,
    pub lines: Option<u64>,
    pub indexed_size: Option<u64>,
    pub indexed_lines: Option<u64>,
    pub chunk_size: Option<u64>,
    pub snap_length: Option<usize>,
    pub entries: usize,
    pub checkpoints: Vec<CheckpointListing>,
}

/// One checkpoint entry as shown by `list`.
#[derive(Debug, Serialize)]
pub struct CheckpointListing {
    /// Byte offset of the line start
    pub offset: u64,

    /// 1-based number of the line at `offset`
    pub line: u64,

    pub fragment: Option<String>,
}

impl IndexListing {
    pub fn from_index(index: &Index) -> Self {
        let exists = index.exists();
        IndexListing {
            source: index.source_path().to_path_buf(),
            source_size: index.source_size(),
            source_modified: local_time(index.source_mtime()),
            index: index.index_path().to_path_buf(),
            status: index.status().as_str().to_string(),
            description: index.status().description().to_string(),
            index_size: index.index_file_size(),
            index_modified: index.index_mtime().and_then(local_time),
            lines: index.source_line_count(),
            indexed_size: index.previous_source_size(),
            indexed_lines: index.previous_source_line_count(),
            chunk_size: exists.then(|| index.chunk_size()),
            snap_length: exists.then(|| index.snap_length()),
            entries: index.len(),
            checkpoints: index
                .entries()
                .iter()
                .map(|entry| CheckpointListing {
                    offset: entry.file_offset,
                    line: entry.line_number + 1,
                    fragment: entry
                        .fragment()
                        .map(|f| String::from_utf8_lossy(f).into_owned()),
                })
                .collect(),
        }
    }
}

fn local_time(seconds: f64) -> Option<DateTime<Local>> {
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    Local.timestamp_opt(secs, nanos).single()
}

fn format_time(time: Option<DateTime<Local>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Run the list command.
///
/// With `verbose`, the text output ends with a table of every checkpoint.
pub fn run(
    app: &App,
    files: &[PathBuf],
    format: OutputFormat,
    verbose: bool,
    location: &IndexLocation,
) -> anyhow::Result<()> {
    let contexts = app.resolve(files, location)?;

    let mut listings = Vec::with_capacity(contexts.len());
    for context in &contexts {
        let index = context.load()?;
        listings.push(IndexListing::from_index(&index));
    }

    match format {
        OutputFormat::Text => {
            for (i, listing) in listings.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print!("{}", render_text(listing, verbose));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listings)?);
        }
    }

    Ok(())
}

fn render_text(listing: &IndexListing, verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", listing.source.display()));
    out.push_str(&format!(
        "  Size:          {} bytes ({})\n",
        thousands(listing.source_size),
        human_bytes(listing.source_size)
    ));
    out.push_str(&format!(
        "  Modified:      {}\n",
        format_time(listing.source_modified)
    ));
    out.push_str(&format!("  Index:         {}\n", listing.index.display()));
    out.push_str(&format!("  Status:        {}\n", listing.description));

    if listing.index_size.is_none() {
        return out;
    }

    if let Some(lines) = listing.lines {
        out.push_str(&format!("  Lines:         {}\n", thousands(lines)));
    } else if let (Some(size), Some(lines)) = (listing.indexed_size, listing.indexed_lines) {
        out.push_str(&format!(
            "  Indexed:       {} lines in {} bytes\n",
            thousands(lines),
            thousands(size)
        ));
    }
    if let Some(chunk) = listing.chunk_size {
        out.push_str(&format!("  Chunk size:    {}\n", thousands(chunk)));
    }
    if let Some(snap) = listing.snap_length {
        out.push_str(&format!("  Snap length:   {}\n", snap));
    }
    out.push_str(&format!("  Entries:       {}\n", thousands(listing.entries as u64)));
    if let Some(size) = listing.index_size {
        out.push_str(&format!("  Index size:    {}\n", human_bytes(size)));
    }
    out.push_str(&format!(
        "  Index updated: {}\n",
        format_time(listing.index_modified)
    ));
    if verbose && !listing.checkpoints.is_empty() {
        out.push_str(&render_checkpoints(&listing.checkpoints));
    }
    out
}

fn render_checkpoints(checkpoints: &[CheckpointListing]) -> String {
    let with_content = checkpoints.iter().any(|c| c.fragment.is_some());
    let mut out = String::new();
    out.push_str(&format!(
        "  {:>6}  {:>14}  {:>14}{}\n",
        "Entry",
        "File position",
        "Line number",
        if with_content { "  Content" } else { "" }
    ));
    out.push_str(&format!(
        "  {}  {}  {}{}\n",
        "-".repeat(6),
        "-".repeat(14),
        "-".repeat(14),
        if with_content { "  ----------" } else { "" }
    ));
    for (i, checkpoint) in checkpoints.iter().enumerate() {
        out.push_str(&format!(
            "  {:>6}  {:>14}  {:>14}",
            thousands(i as u64 + 1),
            thousands(checkpoint.offset),
            thousands(checkpoint.line)
        ));
        if let Some(fragment) = &checkpoint.fragment {
            out.push_str("  ");
            out.push_str(fragment);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineseek_core::{build_or_refresh, BuildOptions, FileStat};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_listing_absent() {
        let index = Index::new("/data/a.log", "/tmp/a.lsidx", FileStat { size: 10, mtime: 0.0 });
        let listing = IndexListing::from_index(&index);
        assert_eq!(listing.status, "absent");
        assert_eq!(listing.chunk_size, None);

        let text = render_text(&listing, true);
        assert!(text.contains("Status:        Not found"));
        assert!(!text.contains("Entries"));
    }

    #[test]
    fn test_listing_fresh_json() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.txt");
        fs::write(&source, "a\nb\nc\n").unwrap();
        let mut index = Index::load(&source, &dir.path().join("data.lsidx")).unwrap();
        build_or_refresh(&mut index, &BuildOptions::new(2, 1)).unwrap();

        let listing = IndexListing::from_index(&index);
        assert_eq!(listing.lines, Some(3));
        assert_eq!(listing.snap_length, Some(1));

        let json: serde_json::Value = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["status"], "fresh");
        assert_eq!(json["entries"], 3);
        assert!(json["index_modified"].is_string());

        let text = render_text(&listing, false);
        assert!(text.contains("Lines:         3"));
        assert!(!text.contains("File position"));
    }

    #[test]
    fn test_verbose_listing_shows_checkpoints() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("data.txt");
        fs::write(&source, "aa\nbb\ncc\n").unwrap();
        let mut index = Index::load(&source, &dir.path().join("data.lsidx")).unwrap();
        build_or_refresh(&mut index, &BuildOptions::new(3, 2)).unwrap();

        let listing = IndexListing::from_index(&index);
        let lines: Vec<(u64, u64)> = listing
            .checkpoints
            .iter()
            .map(|c| (c.offset, c.line))
            .collect();
        assert_eq!(lines, vec![(3, 2), (6, 3), (9, 4)]);
        assert_eq!(listing.checkpoints[0].fragment.as_deref(), Some("bb"));
        assert_eq!(listing.checkpoints[2].fragment, None);

        let json: serde_json::Value = serde_json::to_value(&listing).unwrap();
        assert_eq!(json["checkpoints"][1]["offset"], 6);
        assert_eq!(json["checkpoints"][1]["line"], 3);
        assert_eq!(json["checkpoints"][1]["fragment"], "cc");

        let text = render_text(&listing, true);
        assert!(text.contains("File position"));
        assert!(text.contains("  Content\n"));
        assert!(text.contains(&format!("  {:>6}  {:>14}  {:>14}  bb\n", 1, 3, 2)));
        assert!(text.ends_with(&format!("  {:>6}  {:>14}  {:>14}\n", 3, 9, 4)));
    }

    #[test]
    fn test_local_time() {
        let time = local_time(1_700_000_000.5).unwrap();
        assert_eq!(time.timestamp(), 1_700_000_000);
        assert_eq!(time.timestamp_subsec_millis(), 500);
    }
}

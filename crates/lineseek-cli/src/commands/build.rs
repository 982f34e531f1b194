//! Build command - create or refresh indexes.

use crate::app::{App, FileContext};
use crate::{BuildArgs, IndexLocation};
use anyhow::Context;
use lineseek_core::format::{human_bytes, thousands};
use lineseek_core::{BuildAction, BuildReport, FileStat, Index, IndexBuilder, LoggingProgress};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Run the build command.
pub fn run(
    app: &App,
    files: &[PathBuf],
    args: &BuildArgs,
    location: &IndexLocation,
) -> anyhow::Result<()> {
    app.validate_build_args(args)?;
    let contexts = app.resolve(files, location)?;

    for context in &contexts {
        let (_, report) = build_one(app, context, args, false)?;
        app.say(summary(context, &report));
    }

    Ok(())
}

/// Load and bring one file's index up to date.
///
/// With `--force`, an index file that cannot be parsed or belongs to another
/// data file is discarded and rebuilt.
pub fn build_one(
    app: &App,
    context: &FileContext,
    args: &BuildArgs,
    for_content_search: bool,
) -> anyhow::Result<(Index, BuildReport)> {
    let mut index = match Index::load(&context.source, &context.index_path) {
        Ok(index) => index,
        Err(e) if e.requires_rebuild() && args.force => {
            warn!(index = %context.index_path.display(), error = %e, "Discarding unusable index");
            let stat = FileStat::of(&context.source)
                .with_context(|| format!("Failed to stat {}", context.source.display()))?;
            Index::new(&context.source, &context.index_path, stat)
        }
        Err(e) if e.requires_rebuild() => {
            return Err(anyhow::Error::new(e).context(format!(
                "Unusable index for {}; rebuild it with --force",
                context.source.display()
            )));
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to load index for {}", context.source.display()))
        }
    };

    let options = app
        .build_options(args, Some(&index))?
        .for_content_search(for_content_search);
    let progress = Arc::new(LoggingProgress::new(context.source.display().to_string()));

    let start = Instant::now();
    let report = IndexBuilder::new(options)
        .with_progress(progress)
        .build(&mut index)
        .with_context(|| format!("Failed to index {}", context.source.display()))?;
    debug!(
        source = %context.source.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Build finished"
    );

    Ok((index, report))
}

fn summary(context: &FileContext, report: &BuildReport) -> String {
    let source = context.source.display();
    if report.action == BuildAction::UpToDate {
        return format!(
            "{}: index up to date ({} lines)",
            source,
            thousands(report.lines)
        );
    }

    let verb = if report.written {
        format!("index {}", report.action)
    } else {
        format!("index would be {}", report.action)
    };
    let mut line = format!(
        "{}: {} ({} lines, {}, {} entries) -> {}",
        source,
        verb,
        thousands(report.lines),
        human_bytes(report.bytes_indexed),
        thousands(report.entries as u64),
        context.index_path.display()
    );
    if report.grew_during_build {
        line.push_str(" [file grew while indexing]");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use lineseek_core::{Config, IndexStatus};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, App) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.txt");
        let data: String = (1..=100).map(|i| format!("row {:03}\n", i)).collect();
        fs::write(&file, data).unwrap();

        let mut config = Config::default();
        config.index.dir = ".".to_string();
        config.index.chunk_size = 64;
        (dir, file, App::new(config, false, true))
    }

    #[test]
    fn test_build_creates_index() {
        let (_dir, file, app) = setup();
        run(&app, &[file.clone()], &BuildArgs::default(), &IndexLocation::default()).unwrap();

        let context = &app.resolve(&[file], &IndexLocation::default()).unwrap()[0];
        let index = context.load().unwrap();
        assert_eq!(index.status(), IndexStatus::Fresh);
        assert_eq!(index.source_line_count(), Some(100));
        assert_eq!(index.chunk_size(), 64);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (dir, file, mut app) = setup();
        app.dry_run = true;
        run(&app, &[file], &BuildArgs::default(), &IndexLocation::default()).unwrap();

        let written: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |x| x == "lsidx"))
            .collect();
        assert!(written.is_empty());
    }

    #[test]
    fn test_fails_fast_on_missing_file() {
        let (dir, file, app) = setup();
        let missing = dir.path().join("missing.txt");
        assert!(run(&app, &[missing, file], &BuildArgs::default(), &IndexLocation::default()).is_err());
    }

    #[test]
    fn test_force_replaces_unusable_index() {
        let (_dir, file, app) = setup();
        let context = app.resolve(&[file.clone()], &IndexLocation::default()).unwrap().remove(0);
        fs::write(&context.index_path, "/somewhere/else.txt\n1.0 1 1 1 0 0\n").unwrap();

        assert!(run(&app, &[file.clone()], &BuildArgs::default(), &IndexLocation::default()).is_err());

        let force = BuildArgs {
            force: true,
            ..Default::default()
        };
        run(&app, &[file], &force, &IndexLocation::default()).unwrap();
        assert_eq!(context.load().unwrap().status(), IndexStatus::Fresh);
    }

    #[test]
    fn test_summary() {
        let context = FileContext {
            source: PathBuf::from("/data/a.log"),
            index_path: PathBuf::from("/tmp/a.lsidx"),
        };
        let report = BuildReport {
            action: BuildAction::Created,
            entries: 3,
            bytes_indexed: 2048,
            lines: 1500,
            grew_during_build: false,
            written: true,
        };
        assert_eq!(
            summary(&context, &report),
            "/data/a.log: index created (1,500 lines, 2.0 KiB, 3 entries) -> /tmp/a.lsidx"
        );
    }
}

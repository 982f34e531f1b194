//! Search command - print a range of lines.

use crate::app::App;
use crate::commands::build::build_one;
use crate::{BuildArgs, IndexLocation};
use lineseek_core::{search_to, LineseekError, OutputTarget, SearchQuery};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Run the search command.
///
/// The index is refreshed first so the search always sees the whole file.
pub fn run(
    app: &App,
    file: &Path,
    query: SearchQuery,
    output: &str,
    args: &BuildArgs,
    location: &IndexLocation,
) -> anyhow::Result<()> {
    query.validate()?;
    app.validate_build_args(args)?;
    let contexts = app.resolve(&[PathBuf::from(file)], location)?;
    let context = &contexts[0];

    let (index, report) = build_one(app, context, args, query.is_content_query())?;
    debug!(action = %report.action, entries = report.entries, "Index ready");

    let snap_length = index.snap_length();
    for bound in [&query.greater_than, &query.less_than].into_iter().flatten() {
        if snap_length > 0 && bound.len() > snap_length {
            info!(
                bound = %String::from_utf8_lossy(bound),
                snap_length,
                "Bound is longer than the snap length; only its first bytes narrow the seek"
            );
        }
    }

    let target = OutputTarget::parse(output);
    match search_to(&index, &query, &target) {
        Ok(report) => {
            debug!(
                lines = report.lines_written,
                offset = report.start_offset,
                "Search finished"
            );
            Ok(())
        }
        // A closed pipe (e.g. `| head`) is a normal way for output to end
        Err(LineseekError::OutputWriteFailed { source, .. })
            if source.kind() == ErrorKind::BrokenPipe =>
        {
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

//! Delete command - remove indexes.

use crate::app::App;
use crate::IndexLocation;
use anyhow::Context;
use lineseek_core::delete_index;
use std::path::PathBuf;

/// Run the delete command.
pub fn run(app: &App, files: &[PathBuf], location: &IndexLocation) -> anyhow::Result<()> {
    let contexts = app.resolve(files, location)?;

    for context in &contexts {
        let index = context.index_path.display();
        if app.dry_run {
            if context.index_path.exists() {
                app.say(format!("Would delete {}", index));
            } else {
                app.say(format!("No index at {}", index));
            }
            continue;
        }

        let deleted = delete_index(&context.index_path)
            .with_context(|| format!("Failed to delete index {}", index))?;
        if deleted {
            app.say(format!("Deleted {}", index));
        } else {
            app.say(format!("No index at {}", index));
        }
    }

    Ok(())
}

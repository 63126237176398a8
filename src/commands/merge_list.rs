//! # Merge List Command
//!
//! Offline helper that renders the candidate plugin list for a workspace and
//! merges it into a local `plugins-list.yaml`, exactly as a reconciliation
//! run would before committing it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info};

use overlay_sync::plugins_list;

/// Merge a candidate plugin list into an existing plugins-list.yaml
#[derive(Args, Debug)]
pub struct MergeListArgs {
    /// Existing plugins-list.yaml; a missing file counts as no list
    pub file: PathBuf,

    /// Newline-separated plugin directories published for the workspace
    #[arg(long, env = "PLUGIN_DIRECTORIES")]
    pub plugin_directories: String,

    /// Workspace name, used to strip the `workspaces/<name>/` prefix
    #[arg(long, env = "WORKSPACE_NAME")]
    pub workspace_name: String,

    /// Rewrite the file in place instead of printing the result
    #[arg(long)]
    pub write: bool,
}

/// Execute the `merge-list` command.
pub fn execute(args: MergeListArgs) -> Result<()> {
    let existing = read_existing(&args.file)?;
    let candidate = plugins_list::render_candidate(&args.plugin_directories, &args.workspace_name);
    let merged = plugins_list::merge(&candidate, existing.as_deref());

    if !args.write {
        println!("{}", merged);
        return Ok(());
    }

    if existing.as_deref() == Some(merged.as_str()) {
        info!("{} is already up to date", args.file.display());
        return Ok(());
    }

    fs::write(&args.file, &merged)
        .with_context(|| format!("Failed to write {}", args.file.display()))?;
    info!("Updated {}", args.file.display());
    Ok(())
}

fn read_existing(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(
                "{} does not exist, using the candidate list",
                path.display()
            );
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

//! # Workspace State Comparison
//!
//! Classifies the overlay workspace persisted on a branch against the
//! descriptor discovered upstream. Both workspace files are read in one
//! batched request so they always come from the same branch tip; the
//! plugin-list text is kept in the resulting snapshot so the merge step does
//! not need a second read.

use crate::descriptor::SourceDescriptor;
use crate::error::{Error, Result};
use crate::host::{VcsHost, WorkspaceFiles};

/// How the workspace persisted on a branch relates to the discovered source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceState {
    /// The branch already records the discovered source.
    SourceEqual,
    /// The branch records a different source.
    SourceNeedsUpdate {
        previous_ref: String,
        previous_repo_url: String,
    },
    /// Neither workspace file exists on the branch.
    WorkspaceNotFound,
}

/// Classification of a branch plus the plugin list read alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub state: WorkspaceState,
    /// Existing `plugins-list.yaml` text, when present.
    pub plugins_list: Option<String>,
}

/// Read and classify the workspace on `branch`.
///
/// Fails when either file cannot be read, when only one of the two files
/// exists, or when `source.json` does not parse. Every failure is wrapped
/// with the branch name.
pub async fn classify(
    host: &dyn VcsHost,
    branch: &str,
    source_json_path: &str,
    plugins_list_path: &str,
    discovered: &SourceDescriptor,
) -> Result<WorkspaceSnapshot> {
    let wrap = |source: Error| Error::Workspace {
        branch: branch.to_string(),
        source: Box::new(source),
    };

    let files = host
        .read_workspace_files(branch, source_json_path, plugins_list_path)
        .await
        .map_err(wrap)?;

    classify_files(branch, files, discovered).map_err(wrap)
}

/// Classify already-fetched workspace files.
pub fn classify_files(
    branch: &str,
    files: WorkspaceFiles,
    discovered: &SourceDescriptor,
) -> Result<WorkspaceSnapshot> {
    let (source_json, plugins_list) = match (files.source_json, files.plugins_list) {
        (None, None) => {
            return Ok(WorkspaceSnapshot {
                state: WorkspaceState::WorkspaceNotFound,
                plugins_list: None,
            })
        }
        (None, Some(_)) => {
            return Err(Error::HostInconsistency {
                branch: branch.to_string(),
                missing: "source.json".to_string(),
            })
        }
        (Some(_), None) => {
            return Err(Error::HostInconsistency {
                branch: branch.to_string(),
                missing: "plugins-list.yaml".to_string(),
            })
        }
        (Some(source), Some(list)) => (source, list),
    };

    let persisted = SourceDescriptor::parse(&source_json)?;
    let state = if persisted.content_eq(discovered) {
        WorkspaceState::SourceEqual
    } else {
        WorkspaceState::SourceNeedsUpdate {
            previous_ref: persisted.repo_ref,
            previous_repo_url: persisted.repo_url,
        }
    };

    Ok(WorkspaceSnapshot {
        state,
        plugins_list: Some(plugins_list),
    })
}

//! # Reconciliation Configuration
//!
//! Every input the engine needs is collected by the binary (flags and
//! environment variables) into a `ReconcileInputs` of raw strings, then
//! validated exactly once into a `ReconcileConfig`. The engine only ever
//! sees the validated struct; it reads no environment and holds no global
//! state.
//!
//! Validation rejects:
//! - repository identities that are not `owner/name`,
//! - empty branch, workspace or commit values,
//! - a workspace name containing `/`,
//! - a pull request number that is not a positive integer,
//! - a server URL that does not parse.
//!
//! An empty pull request number means "create mode", matching how CI
//! systems pass unset optional inputs.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::descriptor::SourceDescriptor;
use crate::error::{Error, Result};
use crate::plugins_list;

/// Default web host used for repository and tree links.
pub const DEFAULT_SERVER_URL: &str = "https://github.com";

/// A repository identity in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RepoSlug {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(RepoSlug::new(owner, name))
            }
            _ => Err(Error::ConfigParse {
                message: format!("invalid repository '{}'", trimmed),
                hint: Some(
                    "Use the owner/name form, e.g. redhat-developer/rhdh-plugin-export-overlays"
                        .to_string(),
                ),
            }),
        }
    }
}

impl fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Raw, unvalidated inputs as collected from flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct ReconcileInputs {
    pub overlay_repo: String,
    pub plugins_repo: String,
    pub overlay_repo_branch_name: String,
    pub target_pr_branch_name: String,
    pub backstage_version: String,
    pub workspace_name: String,
    pub workspace_commit: String,
    pub plugins_repo_flat: bool,
    pub plugin_directories: String,
    pub allow_workspace_addition: bool,
    pub pr_to_update: Option<String>,
    pub server_url: Option<String>,
}

/// Validated configuration for one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Repository receiving the workspace branches and pull requests.
    pub overlay_repo: RepoSlug,
    /// Upstream repository the workspace content comes from.
    pub plugins_repo: RepoSlug,
    /// Branch of the overlay repository pull requests target.
    pub base_branch: String,
    /// Branch holding the proposed workspace changes.
    pub target_branch: String,
    pub backstage_version: String,
    pub workspace_name: String,
    pub workspace_commit: String,
    pub plugins_repo_flat: bool,
    /// Newline-separated plugin directories published this run.
    pub plugin_directories: String,
    /// Whether a workspace missing from the base branch may be added.
    pub allow_workspace_addition: bool,
    /// Pull request to update in place; `None` selects create mode.
    pub pr_to_update: Option<u64>,
    pub server_url: Url,
}

impl ReconcileConfig {
    /// Validate raw inputs.
    pub fn from_inputs(inputs: ReconcileInputs) -> Result<Self> {
        let overlay_repo: RepoSlug = inputs.overlay_repo.parse()?;
        let plugins_repo: RepoSlug = inputs.plugins_repo.parse()?;

        let base_branch = required(
            "overlay repository branch",
            &inputs.overlay_repo_branch_name,
        )?;
        let target_branch = required(
            "target pull request branch",
            &inputs.target_pr_branch_name,
        )?;
        let workspace_name = required("workspace name", &inputs.workspace_name)?;
        let workspace_commit = required("workspace commit", &inputs.workspace_commit)?;

        if workspace_name.contains('/') {
            return Err(Error::ConfigParse {
                message: format!("workspace name '{}' must not contain '/'", workspace_name),
                hint: None,
            });
        }

        let pr_to_update = match inputs.pr_to_update.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(number) if number > 0 => Some(number),
                _ => {
                    return Err(Error::ConfigParse {
                        message: format!("invalid pull request number '{}'", raw),
                        hint: Some(
                            "Leave it empty to create a new pull request instead".to_string(),
                        ),
                    })
                }
            },
        };

        let server_url = Url::parse(
            inputs
                .server_url
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_SERVER_URL),
        )?;

        Ok(Self {
            overlay_repo,
            plugins_repo,
            base_branch,
            target_branch,
            backstage_version: inputs.backstage_version.trim().to_string(),
            workspace_name,
            workspace_commit,
            plugins_repo_flat: inputs.plugins_repo_flat,
            plugin_directories: inputs.plugin_directories,
            allow_workspace_addition: inputs.allow_workspace_addition,
            pr_to_update,
            server_url,
        })
    }

    /// `workspaces/<name>`
    pub fn workspace_path(&self) -> String {
        format!("workspaces/{}", self.workspace_name)
    }

    pub fn source_json_path(&self) -> String {
        format!("{}/source.json", self.workspace_path())
    }

    pub fn plugins_list_path(&self) -> String {
        format!("{}/plugins-list.yaml", self.workspace_path())
    }

    /// Canonical URL of the plugins repository, as recorded in `source.json`.
    pub fn plugins_repo_url(&self) -> String {
        format!(
            "{}/{}",
            self.server_url.as_str().trim_end_matches('/'),
            self.plugins_repo
        )
    }

    /// The descriptor of what was discovered upstream this run.
    pub fn discovered_descriptor(&self) -> SourceDescriptor {
        SourceDescriptor::new(
            self.plugins_repo_url(),
            self.workspace_commit.clone(),
            self.plugins_repo_flat,
            Some(self.backstage_version.clone()),
        )
    }

    /// Site-relative link to the workspace sources at the discovered commit.
    pub fn workspace_link(&self) -> String {
        if self.plugins_repo_flat {
            format!("/{}/tree/{}", self.plugins_repo, self.workspace_commit)
        } else {
            format!(
                "/{}/tree/{}/{}",
                self.plugins_repo,
                self.workspace_commit,
                self.workspace_path()
            )
        }
    }

    /// Head selector used to find pull requests from the target branch.
    pub fn pr_head(&self) -> String {
        format!("{}:{}", self.overlay_repo.owner, self.target_branch)
    }

    /// Candidate `plugins-list.yaml` content for this run.
    pub fn candidate_plugins_list(&self) -> String {
        plugins_list::render_candidate(&self.plugin_directories, &self.workspace_name)
    }
}

fn required(what: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::ConfigParse {
            message: format!("{} must not be empty", what),
            hint: None,
        });
    }
    Ok(trimmed.to_string())
}

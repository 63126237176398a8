//! # Source Descriptor
//!
//! The `SourceDescriptor` records where the content of an overlay workspace
//! came from: the upstream plugins repository, the commit the content was
//! taken from, whether that repository uses a flat layout, and the inferred
//! target-platform version.
//!
//! A descriptor is persisted as `workspaces/<name>/source.json`:
//!
//! ```json
//! {"repo":"https://github.com/org/plugins","repo-ref":"deadbeef","repo-flat":false,"repo-backstage-version":"1.32.0"}
//! ```
//!
//! Two descriptors describe the same content when their URL, ref and layout
//! flag match. The backstage version is informational and never takes part
//! in that comparison.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of characters used when a commit is shown in titles and logs.
pub const SHORT_REF_LEN: usize = 7;

/// Where the content of a workspace was taken from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Canonical URL of the upstream plugins repository.
    #[serde(rename = "repo")]
    pub repo_url: String,

    /// Commit the upstream content was taken from.
    #[serde(rename = "repo-ref")]
    pub repo_ref: String,

    /// Whether the upstream repository uses a flat (non-workspace) layout.
    #[serde(rename = "repo-flat", default)]
    pub repo_flat: bool,

    /// Inferred target-platform version.
    #[serde(
        rename = "repo-backstage-version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub backstage_version: Option<String>,
}

impl SourceDescriptor {
    pub fn new(
        repo_url: impl Into<String>,
        repo_ref: impl Into<String>,
        repo_flat: bool,
        backstage_version: Option<String>,
    ) -> Self {
        Self {
            repo_url: repo_url.into(),
            repo_ref: repo_ref.into(),
            repo_flat,
            backstage_version,
        }
    }

    /// Parse a persisted `source.json` document.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Render the compact JSON written to `source.json`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether both descriptors point at the same upstream content.
    ///
    /// The backstage version is ignored.
    pub fn content_eq(&self, other: &SourceDescriptor) -> bool {
        self.repo_url == other.repo_url
            && self.repo_ref == other.repo_ref
            && self.repo_flat == other.repo_flat
    }
}

/// Abbreviate a commit identifier to at most [`SHORT_REF_LEN`] characters.
pub fn short_commit(commit: &str) -> &str {
    match commit.char_indices().nth(SHORT_REF_LEN) {
        Some((idx, _)) => &commit[..idx],
        None => commit,
    }
}

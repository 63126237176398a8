//! # VCS Host Interface
//!
//! The reconciliation engine never talks to a hosting service directly. It
//! goes through the `VcsHost` trait defined here, which covers every read and
//! write the engine needs on the overlay repository plus the commit
//! comparison on the plugins repository.
//!
//! The production implementation is `github::GitHubClient`. Tests drive the
//! engine with an in-memory implementation.
//!
//! Implementations must not retry on their own: a failed call is reported as
//! an `Error` and ends the run.

use async_trait::async_trait;

use crate::config::RepoSlug;
use crate::error::Result;

/// Raw contents of the two workspace files on a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceFiles {
    /// Text of `source.json`, `None` when the file is absent.
    pub source_json: Option<String>,
    /// Text of `plugins-list.yaml`, `None` when the file is absent.
    pub plugins_list: Option<String>,
}

/// An open pull request on the overlay repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    pub head: String,
    pub base: String,
}

/// Tip of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub tree_sha: String,
}

/// How a head commit relates to a base commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonStatus {
    Ahead,
    Behind,
    Identical,
    Diverged,
}

/// Result of comparing two commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub status: ComparisonStatus,
    /// Web page showing the diff between the two commits.
    pub html_url: String,
}

/// A file written in full when building a new tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub content: String,
}

/// Title and body of a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestContent {
    pub title: String,
    pub body: String,
}

/// Operations the engine performs on the VCS host.
#[async_trait]
pub trait VcsHost: Send + Sync {
    /// Read `source.json` and `plugins-list.yaml` at the tip of `branch` in
    /// a single request, so both come from the same commit.
    async fn read_workspace_files(
        &self,
        branch: &str,
        source_json_path: &str,
        plugins_list_path: &str,
    ) -> Result<WorkspaceFiles>;

    /// Open pull requests from `head` into `base`.
    async fn list_pull_requests(&self, base: &str, head: &str) -> Result<Vec<PullRequest>>;

    /// Commit sha a branch points at, or `None` when the branch does not exist.
    async fn get_branch(&self, branch: &str) -> Result<Option<String>>;

    /// Latest commit and its tree on a branch.
    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo>;

    /// Compare two commits of `repo`.
    async fn compare_commits(&self, repo: &RepoSlug, base: &str, head: &str) -> Result<Comparison>;

    /// Create a tree from `base_tree` with `entries` overwritten. Returns the
    /// new tree sha.
    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String>;

    /// Create a commit. Returns the new commit sha.
    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String>;

    /// Create `refs/heads/<branch>` pointing at `sha`.
    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()>;

    /// Fast-forward `refs/heads/<branch>` to `sha`.
    async fn update_ref(&self, branch: &str, sha: &str) -> Result<()>;

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest>;

    async fn update_pull_request(
        &self,
        number: u64,
        base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest>;

    /// Label names on an issue or pull request.
    async fn list_labels(&self, issue: u64) -> Result<Vec<String>>;

    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<()>;

    async fn remove_label(&self, issue: u64, label: &str) -> Result<()>;

    async fn create_comment(&self, issue: u64, body: &str) -> Result<()>;
}

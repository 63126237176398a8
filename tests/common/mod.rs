//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! #[allow(dead_code)]
//! mod common;
//! use common::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let host = FakeHost::new();
//!     let config = reconcile_config(|_| {});
//!     let action = Reconciler::new(&host, &config).reconcile().await.unwrap();
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use overlay_sync::config::{ReconcileConfig, ReconcileInputs, RepoSlug};
use overlay_sync::error::{Error, Result};
use overlay_sync::host::{
    CommitInfo, Comparison, ComparisonStatus, PullRequest, PullRequestContent, TreeEntry, VcsHost,
    WorkspaceFiles,
};

/// Re-export commonly used CLI test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;
}

pub const OWNER: &str = "org";
pub const BASE: &str = "main";
pub const TARGET: &str = "workspaces/main__foo";
pub const WORKSPACE: &str = "foo";
pub const PLUGINS_URL: &str = "https://github.com/org/plugins";
pub const SOURCE_JSON: &str = "workspaces/foo/source.json";
pub const PLUGINS_LIST: &str = "workspaces/foo/plugins-list.yaml";
pub const DISCOVERED: &str = "deadbeefcafe";

/// Inputs for workspace `foo` discovered at [`DISCOVERED`], in create mode
/// with workspace addition allowed. `customize` adjusts them.
pub fn reconcile_config(customize: impl FnOnce(&mut ReconcileInputs)) -> ReconcileConfig {
    let mut inputs = ReconcileInputs {
        overlay_repo: "org/overlays".to_string(),
        plugins_repo: "org/plugins".to_string(),
        overlay_repo_branch_name: BASE.to_string(),
        target_pr_branch_name: TARGET.to_string(),
        backstage_version: "1.32.0".to_string(),
        workspace_name: WORKSPACE.to_string(),
        workspace_commit: DISCOVERED.to_string(),
        plugins_repo_flat: false,
        plugin_directories: "workspaces/foo/plugins/foo\nworkspaces/foo/plugins/foo-backend"
            .to_string(),
        allow_workspace_addition: true,
        pr_to_update: None,
        server_url: None,
    };
    customize(&mut inputs);
    ReconcileConfig::from_inputs(inputs).unwrap()
}

/// A `source.json` recording the plugins repository at `repo_ref`.
pub fn source_json(repo_ref: &str) -> String {
    format!(
        r#"{{"repo":"{}","repo-ref":"{}","repo-flat":false,"repo-backstage-version":"1.31.0"}}"#,
        PLUGINS_URL, repo_ref
    )
}

/// A write the fake host received, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostWrite {
    Tree(Vec<TreeEntry>),
    Commit {
        message: String,
        parents: Vec<String>,
    },
    CreateRef { branch: String, sha: String },
    UpdateRef { branch: String, sha: String },
    CreatePullRequest {
        head: String,
        base: String,
        title: String,
    },
    UpdatePullRequest { number: u64, title: String },
    AddLabels { issue: u64, labels: Vec<String> },
    RemoveLabel { issue: u64, label: String },
    Comment { issue: u64, body: String },
}

#[derive(Default)]
struct State {
    next_id: u64,
    /// branch -> commit sha
    branches: BTreeMap<String, String>,
    /// commit sha -> tree sha
    commits: BTreeMap<String, String>,
    /// tree sha -> path -> content
    trees: BTreeMap<String, BTreeMap<String, String>>,
    pulls: Vec<PullRequest>,
    labels: BTreeMap<u64, Vec<String>>,
    /// (base, head) -> status; unlisted pairs compare as ahead
    comparisons: BTreeMap<(String, String), ComparisonStatus>,
    labels_not_found: bool,
    /// label removal answers 403
    labels_locked: bool,
    writes: Vec<HostWrite>,
}

impl State {
    fn id(&mut self, kind: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", kind, self.next_id)
    }

    fn files_at(&self, branch: &str) -> Option<&BTreeMap<String, String>> {
        let commit = self.branches.get(branch)?;
        let tree = self.commits.get(commit)?;
        self.trees.get(tree)
    }

    fn commit_files(&mut self, parent_files: BTreeMap<String, String>) -> String {
        let tree = self.id("tree");
        self.trees.insert(tree.clone(), parent_files);
        let commit = self.id("commit");
        self.commits.insert(commit.clone(), tree);
        commit
    }
}

fn not_found(operation: &str) -> Error {
    Error::Host {
        operation: operation.to_string(),
        status: Some(404),
        message: "Not Found".to_string(),
    }
}

fn unprocessable(operation: &str, message: &str) -> Error {
    Error::Host {
        operation: operation.to_string(),
        status: Some(422),
        message: message.to_string(),
    }
}

/// In-memory overlay repository implementing [`VcsHost`].
pub struct FakeHost {
    state: Mutex<State>,
}

impl FakeHost {
    /// A repository whose base branch holds a single commit with no
    /// workspace files.
    pub fn new() -> Self {
        let host = Self {
            state: Mutex::new(State::default()),
        };
        {
            let mut state = host.state.lock().unwrap();
            let commit = state.commit_files(BTreeMap::new());
            state.branches.insert(BASE.to_string(), commit);
        }
        host
    }

    /// Commit `files` on top of `branch`, creating the branch from the base
    /// branch when it does not exist yet.
    pub fn with_files(self, branch: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let from = if state.branches.contains_key(branch) {
                branch
            } else {
                BASE
            };
            let mut tree = state.files_at(from).cloned().unwrap_or_default();
            for (path, content) in files {
                tree.insert(path.to_string(), content.to_string());
            }
            let commit = state.commit_files(tree);
            state.branches.insert(branch.to_string(), commit);
        }
        self
    }

    /// Commit both workspace files on `branch`.
    pub fn with_workspace(self, branch: &str, repo_ref: &str, plugins_list: &str) -> Self {
        self.with_files(
            branch,
            &[
                (SOURCE_JSON, source_json(repo_ref).as_str()),
                (PLUGINS_LIST, plugins_list),
            ],
        )
    }

    /// Create `branch` at the tip of the base branch.
    pub fn with_branch(self, branch: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let tip = state.branches[BASE].clone();
            state.branches.insert(branch.to_string(), tip);
        }
        self
    }

    /// Open pull request `number` from the target branch into the base branch.
    pub fn with_pull_request(self, number: u64) -> Self {
        self.state.lock().unwrap().pulls.push(PullRequest {
            number,
            html_url: format!("https://github.com/org/overlays/pull/{}", number),
            head: TARGET.to_string(),
            base: BASE.to_string(),
        });
        self
    }

    pub fn with_comparison(self, base: &str, head: &str, status: ComparisonStatus) -> Self {
        self.state
            .lock()
            .unwrap()
            .comparisons
            .insert((base.to_string(), head.to_string()), status);
        self
    }

    /// Make label listing answer 404, as GitHub does for some issues.
    pub fn with_labels_not_found(self) -> Self {
        self.state.lock().unwrap().labels_not_found = true;
        self
    }

    /// Make label removal answer 403.
    pub fn with_labels_locked(self) -> Self {
        self.state.lock().unwrap().labels_locked = true;
        self
    }

    pub fn with_label(self, issue: u64, label: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .labels
            .entry(issue)
            .or_default()
            .push(label.to_string());
        self
    }

    /// Content of `path` at the tip of `branch`.
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.files_at(branch)?.get(path).cloned()
    }

    pub fn branch_sha(&self, branch: &str) -> Option<String> {
        self.state.lock().unwrap().branches.get(branch).cloned()
    }

    pub fn labels(&self, issue: u64) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .labels
            .get(&issue)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pull_requests(&self) -> Vec<PullRequest> {
        self.state.lock().unwrap().pulls.clone()
    }

    pub fn writes(&self) -> Vec<HostWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                HostWrite::Comment { issue, body } => Some((issue, body)),
                _ => None,
            })
            .collect()
    }

    pub fn created_trees(&self) -> Vec<Vec<TreeEntry>> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                HostWrite::Tree(entries) => Some(entries),
                _ => None,
            })
            .collect()
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VcsHost for FakeHost {
    async fn read_workspace_files(
        &self,
        branch: &str,
        source_json_path: &str,
        plugins_list_path: &str,
    ) -> Result<WorkspaceFiles> {
        let state = self.state.lock().unwrap();
        let files = state.files_at(branch).ok_or_else(|| Error::Host {
            operation: "read workspace files".to_string(),
            status: None,
            message: format!(
                "Empty repository when checking existing content on branch {}",
                branch
            ),
        })?;
        Ok(WorkspaceFiles {
            source_json: files.get(source_json_path).cloned(),
            plugins_list: files.get(plugins_list_path).cloned(),
        })
    }

    async fn list_pull_requests(&self, base: &str, head: &str) -> Result<Vec<PullRequest>> {
        let (owner, branch) = head.split_once(':').unwrap_or(("", head));
        assert_eq!(owner, OWNER, "head selector must be qualified by the owner");
        let state = self.state.lock().unwrap();
        Ok(state
            .pulls
            .iter()
            .filter(|pr| pr.base == base && pr.head == branch)
            .cloned()
            .collect())
    }

    async fn get_branch(&self, branch: &str) -> Result<Option<String>> {
        Ok(self.branch_sha(branch))
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo> {
        let state = self.state.lock().unwrap();
        let sha = state
            .branches
            .get(branch)
            .ok_or_else(|| not_found("latest commit"))?
            .clone();
        let tree_sha = state.commits[&sha].clone();
        Ok(CommitInfo { sha, tree_sha })
    }

    async fn compare_commits(&self, repo: &RepoSlug, base: &str, head: &str) -> Result<Comparison> {
        assert_eq!(repo.to_string(), "org/plugins");
        let state = self.state.lock().unwrap();
        let status = state
            .comparisons
            .get(&(base.to_string(), head.to_string()))
            .copied()
            .unwrap_or(ComparisonStatus::Ahead);
        Ok(Comparison {
            status,
            html_url: format!("{}/compare/{}...{}", PLUGINS_URL, base, head),
        })
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let mut files = state
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable("create tree", "base tree not found"))?;
        for entry in entries {
            files.insert(entry.path.clone(), entry.content.clone());
        }
        let tree = state.id("tree");
        state.trees.insert(tree.clone(), files);
        state.writes.push(HostWrite::Tree(entries.to_vec()));
        Ok(tree)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        let commit = state.id("commit");
        state.commits.insert(commit.clone(), tree.to_string());
        state.writes.push(HostWrite::Commit {
            message: message.to_string(),
            parents: parents.to_vec(),
        });
        Ok(commit)
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.branches.contains_key(branch) {
            return Err(unprocessable("create ref", "Reference already exists"));
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        state.writes.push(HostWrite::CreateRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
        });
        Ok(())
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains_key(branch) {
            return Err(unprocessable("update ref", "Reference does not exist"));
        }
        state.branches.insert(branch.to_string(), sha.to_string());
        state.writes.push(HostWrite::UpdateRef {
            branch: branch.to_string(),
            sha: sha.to_string(),
        });
        Ok(())
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains_key(head) {
            return Err(unprocessable("create pull request", "head branch not found"));
        }
        if state.pulls.iter().any(|pr| pr.head == head && pr.base == base) {
            return Err(unprocessable(
                "create pull request",
                &format!("A pull request already exists for {}:{}.", OWNER, head),
            ));
        }
        let number = state.pulls.iter().map(|pr| pr.number).max().unwrap_or(0) + 1;
        let pull_request = PullRequest {
            number,
            html_url: format!("https://github.com/org/overlays/pull/{}", number),
            head: head.to_string(),
            base: base.to_string(),
        };
        state.pulls.push(pull_request.clone());
        state.writes.push(HostWrite::CreatePullRequest {
            head: head.to_string(),
            base: base.to_string(),
            title: content.title.clone(),
        });
        Ok(pull_request)
    }

    async fn update_pull_request(
        &self,
        number: u64,
        _base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest> {
        let mut state = self.state.lock().unwrap();
        let pull_request = state
            .pulls
            .iter()
            .find(|pr| pr.number == number)
            .cloned()
            .ok_or_else(|| not_found("update pull request"))?;
        state.writes.push(HostWrite::UpdatePullRequest {
            number,
            title: content.title.clone(),
        });
        Ok(pull_request)
    }

    async fn list_labels(&self, issue: u64) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.labels_not_found {
            return Err(not_found("list labels"));
        }
        Ok(state.labels.get(&issue).cloned().unwrap_or_default())
    }

    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let existing = state.labels.entry(issue).or_default();
        for label in labels {
            if !existing.contains(label) {
                existing.push(label.clone());
            }
        }
        state.writes.push(HostWrite::AddLabels {
            issue,
            labels: labels.to_vec(),
        });
        Ok(())
    }

    async fn remove_label(&self, issue: u64, label: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.labels_locked {
            return Err(Error::Host {
                operation: "remove label".to_string(),
                status: Some(403),
                message: "Resource not accessible by integration".to_string(),
            });
        }
        let labels = state.labels.entry(issue).or_default();
        let before = labels.len();
        labels.retain(|l| l != label);
        if labels.len() == before {
            return Err(not_found("remove label"));
        }
        state.writes.push(HostWrite::RemoveLabel {
            issue,
            label: label.to_string(),
        });
        Ok(())
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<()> {
        self.state.lock().unwrap().writes.push(HostWrite::Comment {
            issue,
            body: body.to_string(),
        });
        Ok(())
    }
}

//! Pull request, commit and comment texts.
//!
//! Everything here is a pure function of its inputs so that repeated runs
//! with the same discovery produce identical titles and bodies.

use crate::config::ReconcileConfig;
use crate::descriptor::short_commit;
use crate::host::PullRequestContent;

/// Label attached to a pull request whose workspace commit is out of date.
pub const UPDATE_COMMIT_LABEL: &str = "needs-commit-update";

/// Whether the run adds a new workspace or updates an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Update,
}

impl ChangeKind {
    pub fn verb(self) -> &'static str {
        match self {
            ChangeKind::Add => "Add",
            ChangeKind::Update => "Update",
        }
    }
}

/// Inputs that fully determine the pull request texts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInputs {
    pub kind: ChangeKind,
    pub workspace_name: String,
    pub workspace_commit: String,
    pub workspace_link: String,
    pub backstage_version: String,
    pub base_branch: String,
    /// `owner/name` of the plugins repository.
    pub plugins_repo: String,
    /// Link to the upstream diff since the previously recorded commit.
    pub compare_url: Option<String>,
}

impl MessageInputs {
    pub fn from_config(
        config: &ReconcileConfig,
        kind: ChangeKind,
        compare_url: Option<String>,
    ) -> Self {
        Self {
            kind,
            workspace_name: config.workspace_name.clone(),
            workspace_commit: config.workspace_commit.clone(),
            workspace_link: config.workspace_link(),
            backstage_version: config.backstage_version.clone(),
            base_branch: config.base_branch.clone(),
            plugins_repo: config.plugins_repo.to_string(),
            compare_url,
        }
    }
}

/// Commit message and pull request title.
pub fn title(inputs: &MessageInputs) -> String {
    format!(
        "{} `{}` workspace to commit `{}` for backstage `{}` on branch `{}`",
        inputs.kind.verb(),
        inputs.workspace_name,
        short_commit(&inputs.workspace_commit),
        inputs.backstage_version,
        inputs.base_branch
    )
}

/// Pull request body.
pub fn body(inputs: &MessageInputs) -> String {
    let mut body = format!(
        "{} [{}]({}) workspace at commit {}@{} for backstage `{}` on branch `{}`.\n\n\
         This PR was created automatically.",
        inputs.kind.verb(),
        inputs.workspace_name,
        inputs.workspace_link,
        inputs.plugins_repo,
        inputs.workspace_commit,
        inputs.backstage_version,
        inputs.base_branch
    );

    match (inputs.kind, &inputs.compare_url) {
        (ChangeKind::Add, _) => body.push_str(
            "\nYou might need to complete it with additional dynamic plugin export information, like:\n\
             - the associated `app-config.dynamic.yaml` file for frontend plugins,\n\
             - optionally the `scalprum-config.json` file for frontend plugins,\n\
             - optionally some overlay source files at the plugin level,\n\
             - optionally a `patch` file at the workspace level",
        ),
        (ChangeKind::Update, Some(url)) => body.push_str(&format!(
            "\nClick on the following link to see the source diff it introduces: {}.",
            url
        )),
        (ChangeKind::Update, None) => {}
    }

    body.push_str(
        "\n\nBefore merging, you need to export the workspace dynamic plugins as OCI images,\n\
         and if possible test them inside a RHDH instance.\n\n\
         To do so, you can use the `/publish` instruction in a PR review comment.\n\
         This will start a PR check workflow to:\n\
         - export the workspace plugins as dynamic plugins,\n\
         - publish them as OCI images\n\
         - push the oci-images in the GitHub container registry with a PR-specific tag.\n",
    );
    body
}

/// Title and body together.
pub fn pull_request_content(inputs: &MessageInputs) -> PullRequestContent {
    PullRequestContent {
        title: title(inputs),
        body: body(inputs),
    }
}

/// Comment posted when a pull request is flagged for a manual commit update.
pub fn update_commit_comment() -> &'static str {
    "A new workspace commit has been discovered.\n\
     You can update this PR with the latest discovered workspace source commit.\n\n\
     To do so, you can use the `/update-commit` instruction in a PR review comment."
}

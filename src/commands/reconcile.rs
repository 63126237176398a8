//! # Reconcile Command
//!
//! Runs one reconciliation against GitHub. Every input can be given as a
//! flag or through the environment variable named next to it, which is how
//! CI workflows usually pass them.

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use log::info;

use overlay_sync::config::{ReconcileConfig, ReconcileInputs};
use overlay_sync::github::{GitHubClient, DEFAULT_API_URL, DEFAULT_GRAPHQL_URL};
use overlay_sync::output::{self, OutputConfig};
use overlay_sync::reconcile::{Action, Reconciler};

/// Reconcile one discovered workspace against the overlay repository
#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Overlay repository (owner/name)
    #[arg(long, env = "OVERLAY_REPO")]
    pub overlay_repo: String,

    /// Upstream plugins repository (owner/name)
    #[arg(long, env = "PLUGINS_REPO")]
    pub plugins_repo: String,

    /// Overlay branch the pull request targets
    #[arg(long, env = "OVERLAY_REPO_BRANCH_NAME")]
    pub overlay_repo_branch_name: String,

    /// Branch holding the proposed workspace changes
    #[arg(long, env = "TARGET_PR_BRANCH_NAME")]
    pub target_pr_branch_name: String,

    /// Backstage version the workspace targets
    #[arg(long, env = "BACKSTAGE_VERSION")]
    pub backstage_version: String,

    /// Workspace name
    #[arg(long, env = "WORKSPACE_NAME")]
    pub workspace_name: String,

    /// Discovered upstream commit of the workspace
    #[arg(long, env = "WORKSPACE_COMMIT")]
    pub workspace_commit: String,

    /// Whether the plugins repository is a flat (single workspace) repository
    #[arg(
        long,
        env = "PLUGINS_REPO_FLAT",
        value_name = "BOOL",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub plugins_repo_flat: bool,

    /// Newline-separated plugin directories published for the workspace
    #[arg(long, env = "PLUGIN_DIRECTORIES")]
    pub plugin_directories: String,

    /// Whether a workspace missing from the target branch may be added
    #[arg(
        long,
        env = "ALLOW_WORKSPACE_ADDITION",
        value_name = "BOOL",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub allow_workspace_addition: bool,

    /// Existing pull request to update in place (empty for create mode)
    #[arg(long, env = "PR_TO_UPDATE")]
    pub pr_to_update: Option<String>,

    /// GitHub token used for API requests
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// GitHub GraphQL endpoint
    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = DEFAULT_GRAPHQL_URL)]
    pub graphql_url: String,

    /// GitHub web URL used for repository and tree links
    #[arg(long, env = "GITHUB_SERVER_URL")]
    pub server_url: Option<String>,
}

impl ReconcileArgs {
    fn inputs(&self) -> ReconcileInputs {
        ReconcileInputs {
            overlay_repo: self.overlay_repo.clone(),
            plugins_repo: self.plugins_repo.clone(),
            overlay_repo_branch_name: self.overlay_repo_branch_name.clone(),
            target_pr_branch_name: self.target_pr_branch_name.clone(),
            backstage_version: self.backstage_version.clone(),
            workspace_name: self.workspace_name.clone(),
            workspace_commit: self.workspace_commit.clone(),
            plugins_repo_flat: self.plugins_repo_flat,
            plugin_directories: self.plugin_directories.clone(),
            allow_workspace_addition: self.allow_workspace_addition,
            pr_to_update: self.pr_to_update.clone(),
            server_url: self.server_url.clone(),
        }
    }
}

/// Execute the `reconcile` command.
pub async fn execute(args: ReconcileArgs, annotations_flag: &str) -> Result<()> {
    let config = ReconcileConfig::from_inputs(args.inputs())
        .context("Invalid reconcile inputs")?;
    let client = GitHubClient::new(
        args.token.as_deref(),
        &args.api_url,
        &args.graphql_url,
        config.overlay_repo.clone(),
    )?;
    let output = OutputConfig::from_env_and_flag(annotations_flag);

    let reconciler = Reconciler::new(&client, &config);
    let result = reconciler.reconcile().await;
    // Warnings are shown even when the run fails afterwards.
    for line in warning_annotations(&output, &reconciler.warnings()) {
        println!("{}", line);
    }
    report(&config, &result?, &output)
}

fn warning_annotations(output: &OutputConfig, warnings: &[String]) -> Vec<String> {
    warnings.iter().map(|w| output.warning(w)).collect()
}

fn report(config: &ReconcileConfig, action: &Action, output: &OutputConfig) -> Result<()> {
    for line in output::annotations(output, config, action) {
        println!("{}", line);
    }

    match action {
        Action::CreatePr { pull_request, .. } => {
            info!("Pull request created: {}", pull_request.html_url)
        }
        Action::UpdatePr { pull_request } => {
            info!("Pull request updated: {}", pull_request.html_url)
        }
        _ => {}
    }

    if let Some(summary) = output::run_summary(config, action) {
        output::write_summary(&summary).context("Failed to write run summary")?;
    }
    Ok(())
}

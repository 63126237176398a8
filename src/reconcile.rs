//! # Pull Request Lifecycle
//!
//! The `Reconciler` decides what a run does with a discovered workspace
//! commit and performs the corresponding writes on the VCS host.
//!
//! ## Decision flow
//!
//! 1.  Classify the workspace on the base branch. If it already records the
//!     discovered source, skip.
//! 2.  Look up the open pull request from the target branch into the base
//!     branch. More than one is an error.
//! 3.  A workspace missing from the base branch, with no pull request, is only
//!     added when workspace addition is allowed; otherwise a notice is
//!     returned.
//! 4.  When the base branch records an older commit of the same upstream
//!     repository, the discovered commit must be strictly ahead of it.
//!     Otherwise the run stops with a warning and writes nothing.
//! 5.  With an existing pull request, classify the target branch: skip when
//!     it is current, flag the pull request for a manual update when it is
//!     stale and no update was requested, and warn when the workspace is
//!     missing from it.
//! 6.  Write the branch (new tree, new commit, create or fast-forward the
//!     ref) unless the branch already exists without a pull request, then
//!     create or update the pull request.
//!
//! Pull request creation is always the last write, so an interrupted run
//! leaves at most a branch without a pull request, which the next run picks
//! up at step 6.
//!
//! Warnings raised along the way are logged and also kept on the
//! `Reconciler`, so the caller can surface them as CI annotations even when
//! the run later fails.

use std::sync::{Mutex, PoisonError};

use log::{debug, info, warn};

use crate::config::ReconcileConfig;
use crate::descriptor::{short_commit, SourceDescriptor};
use crate::error::{Error, Result};
use crate::host::{ComparisonStatus, PullRequest, TreeEntry, VcsHost};
use crate::message::{self, ChangeKind, MessageInputs, UPDATE_COMMIT_LABEL};
use crate::plugins_list;
use crate::workspace::{self, WorkspaceSnapshot, WorkspaceState};

/// Why a run wrote nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The base branch already records the discovered source.
    BaseUpToDate,
    /// The open pull request already records the discovered source.
    PullRequestUpToDate { number: u64 },
    /// The discovered commit is not ahead of the recorded one.
    NotAhead {
        previous_ref: String,
        discovered_ref: String,
    },
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Skip(SkipReason),
    /// Nothing was written; the message explains why.
    Notice { title: String, message: String },
    /// A pull request was opened. `branch_written` is false when the branch
    /// already existed from an earlier, interrupted run.
    CreatePr {
        pull_request: PullRequest,
        branch_written: bool,
    },
    /// The requested pull request and its branch were updated in place.
    UpdatePr { pull_request: PullRequest },
    /// The open pull request is stale and needs a manually triggered update.
    /// `newly_labeled` is false when it had already been flagged.
    FlagForManualUpdate { number: u64, newly_labeled: bool },
}

/// Drives one reconciliation run against a VCS host.
pub struct Reconciler<'a> {
    host: &'a dyn VcsHost,
    config: &'a ReconcileConfig,
    warnings: Mutex<Vec<String>>,
}

impl<'a> Reconciler<'a> {
    pub fn new(host: &'a dyn VcsHost, config: &'a ReconcileConfig) -> Self {
        Self {
            host,
            config,
            warnings: Mutex::new(Vec::new()),
        }
    }

    /// Warnings raised so far, in order.
    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn warning(&self, message: String) {
        warn!("{}", message);
        self.warnings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    /// Run the decision flow described in the module documentation.
    pub async fn reconcile(&self) -> Result<Action> {
        let config = self.config;
        let discovered = config.discovered_descriptor();
        let short = short_commit(&config.workspace_commit);

        info!("Checking existing content on the target branch");
        let base = self.classify(&config.base_branch, &discovered).await?;

        if base.state == WorkspaceState::SourceEqual {
            info!(
                "Workspace skipped: Workspace {} already exists on branch {} with the same commit {}",
                config.workspace_name, config.base_branch, short
            );
            return Ok(Action::Skip(SkipReason::BaseUpToDate));
        }

        info!("Checking pull request existence");
        let existing_pr = self.find_pull_request().await?;

        match &base.state {
            WorkspaceState::SourceNeedsUpdate { .. } => {
                info!("Workspace already exists on the target branch, but needs to be updated");
            }
            WorkspaceState::WorkspaceNotFound if existing_pr.is_none() => {
                info!(
                    "Workspace {} not found on branch {}",
                    config.workspace_name, config.base_branch
                );
                if !config.allow_workspace_addition {
                    return Ok(Action::Notice {
                        title: "Workspace not added".to_string(),
                        message: format!(
                            "Workspace {} doesn't already exist on branch {}, but workspaces are not automatically added on this branch.",
                            config.workspace_name, config.base_branch
                        ),
                    });
                }
            }
            _ => {}
        }

        let compare_url = match &base.state {
            WorkspaceState::SourceNeedsUpdate {
                previous_ref,
                previous_repo_url,
            } if *previous_repo_url == discovered.repo_url => {
                let comparison = self
                    .host
                    .compare_commits(&config.plugins_repo, previous_ref, &discovered.repo_ref)
                    .await?;
                if comparison.status != ComparisonStatus::Ahead {
                    self.warning(format!(
                        "New discovered commit ({}) is not ahead of the previous commit ({}).\n\
                         Either the previous commit has been manually forced, or there has been an error in the discovery process \
                         (missing plugin package, wrong gitHead value in the published NPM package, ...).",
                        discovered.repo_ref, previous_ref
                    ));
                    return Ok(Action::Skip(SkipReason::NotAhead {
                        previous_ref: previous_ref.clone(),
                        discovered_ref: discovered.repo_ref.clone(),
                    }));
                }
                Some(comparison.html_url)
            }
            _ => None,
        };

        let mut pr_snapshot = None;
        if let Some(pr) = &existing_pr {
            let snapshot = self.classify(&config.target_branch, &discovered).await?;
            match &snapshot.state {
                WorkspaceState::SourceEqual => {
                    info!(
                        "Workspace skipped: Pull request #{} for workspace {} based on branch {} already exists with the same commit {}",
                        pr.number, config.workspace_name, config.target_branch, short
                    );
                    return Ok(Action::Skip(SkipReason::PullRequestUpToDate { number: pr.number }));
                }
                WorkspaceState::SourceNeedsUpdate { .. } if config.pr_to_update.is_none() => {
                    return self.flag_for_manual_update(pr).await;
                }
                WorkspaceState::SourceNeedsUpdate { .. } => {}
                WorkspaceState::WorkspaceNotFound => {
                    self.warning(format!(
                        "Workspace {} not found on branch {}, but should be there",
                        config.workspace_name, config.target_branch
                    ));
                }
            }
            pr_snapshot = Some(snapshot);
        }

        if let Some(requested) = config.pr_to_update {
            if existing_pr.as_ref().map(|pr| pr.number) != Some(requested) {
                return Err(Error::AmbiguousPrUpdate {
                    requested,
                    branch: config.target_branch.clone(),
                });
            }
        }

        info!("Checking pull request branch existence");
        let branch_exists = self.host.get_branch(&config.target_branch).await?.is_some();
        if branch_exists && config.pr_to_update.is_none() {
            info!(
                "Pull request branch already exists, but the corresponding PR is missing. The PR will be created."
            );
        } else if !branch_exists {
            info!(
                "Pull request branch {} doesn't already exist.",
                config.target_branch
            );
        }

        let kind = match base.state {
            WorkspaceState::SourceNeedsUpdate { .. } => ChangeKind::Update,
            _ => ChangeKind::Add,
        };
        let inputs = MessageInputs::from_config(config, kind, compare_url);
        let content = message::pull_request_content(&inputs);

        let mut branch_written = false;
        if !branch_exists || config.pr_to_update.is_some() {
            // The list is merged against the branch the new commit builds on,
            // or against the base branch when that branch has no list.
            let (from_branch, existing_list) = match config.pr_to_update {
                Some(_) => (
                    config.target_branch.as_str(),
                    pr_snapshot
                        .and_then(|snapshot| snapshot.plugins_list)
                        .or(base.plugins_list),
                ),
                None => (config.base_branch.as_str(), base.plugins_list),
            };
            self.write_branch(
                from_branch,
                existing_list.as_deref(),
                &discovered,
                &content.title,
            )
            .await?;
            branch_written = true;
        }

        match config.pr_to_update {
            Some(number) => {
                info!("Updating pull request");
                let pull_request = self
                    .host
                    .update_pull_request(number, &config.base_branch, &content)
                    .await?;
                self.remove_update_label(number).await;
                Ok(Action::UpdatePr { pull_request })
            }
            None => {
                info!("Creating pull request");
                let pull_request = self
                    .host
                    .create_pull_request(&config.target_branch, &config.base_branch, &content)
                    .await?;
                Ok(Action::CreatePr {
                    pull_request,
                    branch_written,
                })
            }
        }
    }

    async fn classify(
        &self,
        branch: &str,
        discovered: &SourceDescriptor,
    ) -> Result<WorkspaceSnapshot> {
        workspace::classify(
            self.host,
            branch,
            &self.config.source_json_path(),
            &self.config.plugins_list_path(),
            discovered,
        )
        .await
    }

    async fn find_pull_request(&self) -> Result<Option<PullRequest>> {
        let head = self.config.pr_head();
        let mut prs = self
            .host
            .list_pull_requests(&self.config.base_branch, &head)
            .await?;
        match prs.len() {
            0 => Ok(None),
            1 => Ok(prs.pop()),
            count => Err(Error::AmbiguousPullRequests {
                base: self.config.base_branch.clone(),
                head,
                count,
            }),
        }
    }

    /// Label the stale pull request and explain how to update it, once.
    async fn flag_for_manual_update(&self, pr: &PullRequest) -> Result<Action> {
        info!(
            "Pull request #{} for workspace {} based on branch {} already exists; workspace reference should be manually set to commit {}",
            pr.number,
            self.config.workspace_name,
            self.config.target_branch,
            self.config.workspace_commit
        );

        let labels = match self.host.list_labels(pr.number).await {
            Ok(labels) => labels,
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(e),
        };
        let already_labeled = labels.iter().any(|l| l == UPDATE_COMMIT_LABEL);

        if !already_labeled {
            self.host
                .add_labels(pr.number, &[UPDATE_COMMIT_LABEL.to_string()])
                .await?;
            self.host
                .create_comment(pr.number, message::update_commit_comment())
                .await?;
        } else {
            debug!("Pull request #{} is already labeled", pr.number);
        }

        Ok(Action::FlagForManualUpdate {
            number: pr.number,
            newly_labeled: !already_labeled,
        })
    }

    /// Best effort: the pull request is already updated at this point.
    async fn remove_update_label(&self, number: u64) {
        match self.host.remove_label(number, UPDATE_COMMIT_LABEL).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(
                    "Pull request #{} had no {} label",
                    number, UPDATE_COMMIT_LABEL
                );
            }
            Err(e) => self.warning(format!(
                "Could not remove the {} label from pull request #{}: {}",
                UPDATE_COMMIT_LABEL, number, e
            )),
        }
    }

    /// Commit both workspace files on top of `from_branch` and point the
    /// target branch at the result.
    async fn write_branch(
        &self,
        from_branch: &str,
        existing_list: Option<&str>,
        discovered: &SourceDescriptor,
        message: &str,
    ) -> Result<String> {
        let config = self.config;
        let plugins_list = plugins_list::merge(&config.candidate_plugins_list(), existing_list);
        let source_json = discovered.to_json()?;

        info!(
            "Getting latest commit sha and treeSha of branch {}",
            from_branch
        );
        let tip = self.host.latest_commit(from_branch).await?;

        info!("Creating tree");
        debug!("on treeSha: {}", tip.tree_sha);
        let entries = [
            TreeEntry {
                path: config.plugins_list_path(),
                content: plugins_list,
            },
            TreeEntry {
                path: config.source_json_path(),
                content: source_json,
            },
        ];
        let tree = self.host.create_tree(&tip.tree_sha, &entries).await?;

        info!("Creating commit");
        let commit = self.host.create_commit(message, &tree, &[tip.sha]).await?;
        debug!("new commit sha: {}", commit);

        if config.pr_to_update.is_some() {
            info!("Updating branch");
            self.host.update_ref(&config.target_branch, &commit).await?;
        } else {
            info!("Creating branch");
            self.host.create_ref(&config.target_branch, &commit).await?;
        }

        Ok(commit)
    }
}

//! # Run Output
//!
//! This module turns the outcome of a run into what a CI user sees:
//! workflow annotations (notices and warnings) and a markdown run summary.
//!
//! ## Annotation style
//!
//! - `--annotations=github` prints GitHub Actions workflow commands
//!   (`::notice title=...::message`).
//! - `--annotations=plain` prints a prefixed line, coloured when the
//!   terminal supports it.
//! - `--annotations=auto` picks `github` when `GITHUB_ACTIONS=true`.
//!
//! Colour in plain mode follows `NO_COLOR`, `CLICOLOR`, `CLICOLOR_FORCE`
//! and `TERM=dumb`, falling back to `console`'s terminal detection.
//!
//! ## Summary
//!
//! The summary is appended to the file named by `GITHUB_STEP_SUMMARY` when
//! it is set, and printed to stdout otherwise.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;

use console::style;

use crate::config::ReconcileConfig;
use crate::descriptor::short_commit;
use crate::error::Result;
use crate::reconcile::Action;

/// How annotations are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStyle {
    GitHub,
    Plain,
}

/// Output configuration for annotations and colours.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub style: AnnotationStyle,
    /// Whether plain annotations are coloured.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from the environment and the
    /// `--annotations` flag (`github`, `plain` or `auto`).
    pub fn from_env_and_flag(annotations_flag: &str) -> Self {
        let style = match annotations_flag.to_lowercase().as_str() {
            "github" => AnnotationStyle::GitHub,
            "plain" => AnnotationStyle::Plain,
            _ => {
                if env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
                    AnnotationStyle::GitHub
                } else {
                    AnnotationStyle::Plain
                }
            }
        };

        Self {
            style,
            use_color: Self::detect_color_support(),
        }
    }

    fn detect_color_support() -> bool {
        // https://no-color.org/: presence alone disables colours
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    #[cfg(test)]
    pub fn github() -> Self {
        Self {
            style: AnnotationStyle::GitHub,
            use_color: false,
        }
    }

    #[cfg(test)]
    pub fn plain() -> Self {
        Self {
            style: AnnotationStyle::Plain,
            use_color: false,
        }
    }

    /// Render a notice annotation.
    pub fn notice(&self, title: &str, message: &str) -> String {
        match self.style {
            AnnotationStyle::GitHub => format!(
                "::notice title={}::{}",
                escape_property(title),
                escape_data(message)
            ),
            AnnotationStyle::Plain => {
                let prefix = format!("notice: {}:", title);
                if self.use_color {
                    format!("{} {}", style(prefix).cyan().bold(), message)
                } else {
                    format!("{} {}", prefix, message)
                }
            }
        }
    }

    /// Render a warning annotation.
    pub fn warning(&self, message: &str) -> String {
        match self.style {
            AnnotationStyle::GitHub => format!("::warning::{}", escape_data(message)),
            AnnotationStyle::Plain => {
                if self.use_color {
                    format!("{} {}", style("warning:").yellow().bold(), message)
                } else {
                    format!("warning: {}", message)
                }
            }
        }
    }
}

/// Escape a workflow command message.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a workflow command property value.
fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}

/// Annotations to print for an action, in order.
///
/// Warnings raised during the run are reported separately, from
/// `Reconciler::warnings`.
pub fn annotations(
    output: &OutputConfig,
    config: &ReconcileConfig,
    action: &Action,
) -> Vec<String> {
    match action {
        Action::Notice { title, message } => vec![output.notice(title, message)],
        Action::FlagForManualUpdate { number, .. } => vec![output.notice(
            "Workspace PR needs manually-triggered update",
            &format!(
                "Pull request #{} for workspace {} based on branch {} already exists; do not try to create it again.\nWorkspace reference should be manually set to commit {}.",
                number, config.workspace_name, config.target_branch, config.workspace_commit
            ),
        )],
        Action::Skip(_) | Action::CreatePr { .. } | Action::UpdatePr { .. } => Vec::new(),
    }
}

/// Markdown summary of a run that created or updated a pull request.
///
/// Returns `None` for runs that wrote nothing.
pub fn run_summary(config: &ReconcileConfig, action: &Action) -> Option<String> {
    let (done, pull_request) = match action {
        Action::CreatePr { pull_request, .. } => ("created", pull_request),
        Action::UpdatePr { pull_request } => ("updated", pull_request),
        _ => return None,
    };

    Some(format!(
        "## Workspace PR {done}\n\n\
         [Pull request]({pr_url}) on branch {base} {done} for workspace \
         [{workspace}]({server}{link}) at commit {commit} for backstage {version}\n",
        done = done,
        pr_url = pull_request.html_url,
        base = config.base_branch,
        workspace = config.workspace_name,
        server = config.server_url.as_str().trim_end_matches('/'),
        link = config.workspace_link(),
        commit = short_commit(&config.workspace_commit),
        version = config.backstage_version,
    ))
}

/// Append the summary to `GITHUB_STEP_SUMMARY`, or print it.
pub fn write_summary(summary: &str) -> Result<()> {
    match env::var_os("GITHUB_STEP_SUMMARY") {
        Some(path) if !path.is_empty() => {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}", summary)?;
        }
        _ => println!("{}", summary),
    }
    Ok(())
}

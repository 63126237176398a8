//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands;

/// Overlay Sync - Keep overlay workspaces in step with upstream plugin sources
#[derive(Parser, Debug)]
#[command(name = "overlay-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Annotation style for notices and warnings (auto, github, plain)
    #[arg(long, global = true, value_name = "STYLE", default_value = "auto")]
    annotations: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile one discovered workspace against the overlay repository
    Reconcile(commands::reconcile::ReconcileArgs),

    /// Merge a candidate plugin list into an existing plugins-list.yaml
    MergeList(commands::merge_list::MergeListArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Reconcile(args) => {
                commands::reconcile::execute(args, &self.annotations).await
            }
            Commands::MergeList(args) => commands::merge_list::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initialise `env_logger`. `RUST_LOG` takes precedence over `--log-level`.
fn init_logging(log_level: &str) {
    let mut builder = env_logger::Builder::new();
    match std::env::var("RUST_LOG") {
        Ok(filters) if !filters.is_empty() => {
            builder.parse_filters(&filters);
        }
        _ => {
            builder.filter_level(parse_level(log_level));
        }
    }
    // A second initialisation (e.g. from tests) is not an error.
    let _ = builder.format_timestamp(None).try_init();
}

fn parse_level(log_level: &str) -> LevelFilter {
    log_level.parse().unwrap_or(LevelFilter::Info)
}

//! # Error Handling
//!
//! This module defines the closed error taxonomy for the reconciliation
//! engine. Every failure the engine can surface is one of the `Error`
//! variants below, built with `thiserror` so each carries a readable message
//! and the context needed to act on it.
//!
//! ## Categories
//!
//! - **Configuration**: `ConfigParse`, raised once at the entry point while
//!   validating inputs.
//! - **Persisted state**: `HostInconsistency`, when a branch holds only one
//!   of the two workspace files.
//! - **Pull request identity**: `AmbiguousPrUpdate` and
//!   `AmbiguousPullRequests`, raised before anything is written.
//! - **Host and transport**: `Host` for non-success responses (with the HTTP
//!   status when there is one) and `Network` for transport failures.
//! - **Wrapped library errors**: JSON, I/O and URL parsing.
//!
//! None of these are retried by the engine. They propagate to the binary,
//! which reports them and exits with a non-zero status.

use thiserror::Error;

/// Main error type for overlay-sync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A configuration input failed validation.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the input
        hint: Option<String>,
    },

    /// Exactly one of the two workspace files exists on a branch.
    ///
    /// The persisted state is malformed and neither file can be trusted on
    /// its own.
    #[error("{missing} is not found when checking existing content on branch {branch}")]
    HostInconsistency { branch: String, missing: String },

    /// A pull request number to update was supplied, but it is not the pull
    /// request found for the target branch.
    #[error("Pull request {requested} cannot be updated, because no automatically-created PR based on branch {branch} was found")]
    AmbiguousPrUpdate { requested: u64, branch: String },

    /// More than one open pull request matches the base and head branches.
    #[error("Found {count} pull requests from {head} into {base}; expected at most one")]
    AmbiguousPullRequests {
        base: String,
        head: String,
        count: usize,
    },

    /// The VCS host answered with a non-success response.
    #[error("Host operation failed: {operation}{} - {message}", status.map(|s| format!(" (status {})", s)).unwrap_or_default())]
    Host {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// A request to the VCS host could not be completed.
    #[error("Network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// Classifying the workspace on a branch failed.
    #[error("Failed when checking existing content on branch {branch}: {source}")]
    Workspace {
        branch: String,
        #[source]
        source: Box<Error>,
    },

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Whether this error is a host response with status 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Host { status: Some(404), .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

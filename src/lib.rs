//! # Overlay Sync Library
//!
//! This library keeps an overlay repository in step with workspaces
//! discovered in an upstream plugins repository. For each discovered
//! workspace commit it decides whether the overlay needs a new pull request,
//! an in-place update of an existing one, a "needs update" flag, or nothing
//! at all, and performs the corresponding writes through a VCS host.
//!
//! ## Quick Example
//!
//! ```
//! use overlay_sync::plugins_list;
//!
//! let candidate = plugins_list::render_candidate(
//!     "workspaces/foo/plugins/a\nworkspaces/foo/plugins/c",
//!     "foo",
//! );
//! assert_eq!(candidate, "plugins/a:\nplugins/c:");
//!
//! let merged = plugins_list::merge(&candidate, Some("plugins/a:\n# plugins/b: disabled"));
//! assert_eq!(merged, "plugins/a:\nplugins/c:");
//! ```
//!
//! ## Core Concepts
//!
//! - **Source descriptor (`descriptor`)**: the `source.json` record of which
//!   upstream repository and commit a workspace was built from.
//! - **Plugin list (`plugins_list`)**: the line-oriented `plugins-list.yaml`
//!   and the merge that preserves manual edits.
//! - **Workspace state (`workspace`)**: how the files persisted on a branch
//!   relate to the discovered source.
//! - **Lifecycle (`reconcile`)**: the idempotent decision flow that creates,
//!   updates or flags pull requests.
//! - **Host (`host`, `github`)**: the narrow set of VCS operations the
//!   lifecycle needs, and its GitHub implementation.
//!
//! Configuration is validated once in `config`; run outcomes are rendered as
//! CI annotations and a markdown summary by `output`.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod github;
pub mod host;
pub mod message;
pub mod output;
pub mod plugins_list;
pub mod reconcile;
pub mod workspace;

#[cfg(test)]
mod plugins_list_proptest;

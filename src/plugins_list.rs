//! # Plugin List Merging
//!
//! A workspace's `plugins-list.yaml` holds one plugin directory per line,
//! rendered as a YAML key (`<dir>:`). Maintainers edit this file by hand:
//! they comment entries out, or append free-text annotations after the key.
//! When the list is regenerated from upstream, those edits must survive.
//!
//! ## Matching
//!
//! An existing line matches a candidate line when, after stripping an
//! optional leading `#` and the spaces that follow it, the existing line
//! starts with the candidate text. The comparison is a literal prefix test:
//! whatever follows the candidate text (an annotation, a comment) is ignored.
//! Rendered candidates end with `:`, so `foo:` does not match `foo-bar:`.
//!
//! ## Merge rule
//!
//! - Existing lines that match some candidate are kept verbatim, in order.
//! - Candidate lines that match no existing line are appended, in order.
//! - Everything else from the existing list is dropped.
//! - When nothing is added or dropped the existing text is returned as-is,
//!   so regenerating an unchanged list never produces a diff.

/// Render the candidate list from the newline-separated plugin directories
/// being published for a workspace.
///
/// A leading `workspaces/<workspace>/` prefix is stripped from each entry so
/// the list holds paths relative to the workspace. Blank entries are ignored.
pub fn render_candidate(plugin_directories: &str, workspace_name: &str) -> String {
    let prefix = format!("workspaces/{}/", workspace_name);
    plugin_directories
        .lines()
        .map(str::trim)
        .filter(|dir| !dir.is_empty())
        .map(|dir| {
            let relative = dir.strip_prefix(&prefix).unwrap_or(dir);
            format!("{}:", relative)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The text of a line with an optional leading comment marker removed.
fn strip_comment(line: &str) -> &str {
    let rest = line.strip_prefix('#').unwrap_or(line);
    rest.trim_start_matches(' ')
}

/// Whether an existing line refers to the same plugin as a candidate line.
pub fn line_matches(existing: &str, candidate: &str) -> bool {
    strip_comment(existing).starts_with(candidate)
}

/// The plugin-name token at the start of a line, if any.
///
/// The token is the text before the first `:` once an optional comment
/// marker is stripped. Blank and structural lines have no token.
#[cfg(test)]
pub(crate) fn plugin_token(line: &str) -> Option<&str> {
    let (token, _) = strip_comment(line).split_once(':')?;
    let token = token.trim_end();
    (!token.is_empty()).then_some(token)
}

/// Merge a freshly rendered candidate list into the list already present on
/// a branch.
///
/// `existing` is `None` when the branch has no list; a blank list is treated
/// the same way. See the module documentation for the rule.
pub fn merge(candidate: &str, existing: Option<&str>) -> String {
    let existing_text = match existing {
        Some(text) if !text.trim().is_empty() => text,
        _ => return candidate.to_string(),
    };

    let existing_lines: Vec<&str> = existing_text.trim().split('\n').collect();
    let candidate_lines: Vec<&str> = candidate.trim().split('\n').collect();

    let to_add: Vec<&str> = candidate_lines
        .iter()
        .copied()
        .filter(|c| !existing_lines.iter().any(|e| line_matches(e, c)))
        .collect();

    let to_keep: Vec<&str> = existing_lines
        .iter()
        .copied()
        .filter(|e| candidate_lines.iter().any(|c| line_matches(e, c)))
        .collect();

    if to_add.is_empty() && to_keep.len() == existing_lines.len() {
        return existing_text.to_string();
    }

    to_keep
        .into_iter()
        .chain(to_add)
        .collect::<Vec<_>>()
        .join("\n")
}

//! Property-based tests for plugin list merging.

#[cfg(test)]
mod proptest_tests {
    use crate::plugins_list::{merge, plugin_token};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    /// Plugin directories drawn from a small alphabet so candidates and
    /// existing lines overlap often.
    fn token() -> impl Strategy<Value = String> {
        "[a-c]{1,2}(/[a-c]{1,2})?"
    }

    /// An existing line for a token: optionally commented out, optionally
    /// annotated after the key.
    fn existing_line(token: String) -> impl Strategy<Value = String> {
        (any::<bool>(), "( [a-z#=-]{1,8})?").prop_map(move |(commented, annotation)| {
            let marker = if commented { "# " } else { "" };
            format!("{}{}:{}", marker, token, annotation)
        })
    }

    fn existing_lines() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(token(), 1..6).prop_flat_map(|tokens| {
            tokens
                .into_iter()
                .map(existing_line)
                .collect::<Vec<_>>()
        })
    }

    fn candidate() -> impl Strategy<Value = (BTreeSet<String>, String)> {
        prop::collection::btree_set(token(), 1..6).prop_map(|tokens| {
            let text = tokens
                .iter()
                .map(|t| format!("{}:", t))
                .collect::<Vec<_>>()
                .join("\n");
            (tokens, text)
        })
    }

    proptest! {
        /// Property: a list already covering exactly the candidate is returned byte-for-byte
        #[test]
        fn merge_is_stable_for_matching_list(lines in existing_lines(), trailing_newline in any::<bool>()) {
            let candidate = lines
                .iter()
                .filter_map(|l| plugin_token(l))
                .map(|t| format!("{}:", t))
                .collect::<Vec<_>>()
                .join("\n");
            let mut existing = lines.join("\n");
            if trailing_newline {
                existing.push('\n');
            }

            prop_assert_eq!(merge(&candidate, Some(&existing)), existing);
        }

        /// Property: merging a merge result again changes nothing
        #[test]
        fn merge_is_idempotent(lines in existing_lines(), (_, candidate) in candidate()) {
            let existing = lines.join("\n");
            let once = merge(&candidate, Some(&existing));
            let twice = merge(&candidate, Some(&once));
            prop_assert_eq!(twice, once);
        }

        /// Property: the result names every candidate plugin and nothing else
        #[test]
        fn merge_keeps_exactly_candidate_plugins(lines in existing_lines(), (tokens, candidate) in candidate()) {
            let existing = lines.join("\n");
            let merged = merge(&candidate, Some(&existing));

            let merged_tokens: BTreeSet<String> = merged
                .lines()
                .map(|line| plugin_token(line).map(str::to_string))
                .collect::<Option<_>>()
                .unwrap_or_default();
            prop_assert_eq!(merged_tokens, tokens);
        }

        /// Property: retained lines keep their original text and relative order
        #[test]
        fn merge_preserves_retained_lines(lines in existing_lines(), (tokens, candidate) in candidate()) {
            let existing = lines.join("\n");
            let merged = merge(&candidate, Some(&existing));

            let retained: Vec<&str> = lines
                .iter()
                .map(String::as_str)
                .filter(|l| plugin_token(l).is_some_and(|t| tokens.contains(t)))
                .collect();
            let merged_lines: Vec<&str> = merged.lines().collect();
            prop_assert_eq!(&merged_lines[..retained.len()], &retained[..]);
        }

        /// Property: an absent or blank list yields the candidate unchanged
        #[test]
        fn merge_without_existing_is_candidate((_, candidate) in candidate(), blank in "[ \n]{0,3}") {
            prop_assert_eq!(merge(&candidate, None), candidate.clone());
            prop_assert_eq!(merge(&candidate, Some(&blank)), candidate);
        }
    }
}

//! Rule evaluation against a filesystem snapshot

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use super::rule::{SortMethod, SyncRule};
use crate::{Error, Result};

/// Desired partitioning: syncname -> ordered absolute directories
pub type DesiredAssignment = BTreeMap<String, Vec<PathBuf>>;

/// Shell-style matching: `*` stays within one path segment and does not
/// pick up dot-directories.
const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Evaluates an ordered rule list into a [`DesiredAssignment`].
#[derive(Debug, Clone, Copy)]
pub struct RuleEngine<'a> {
    rules: &'a [SyncRule],
}

impl<'a> RuleEngine<'a> {
    pub fn new(rules: &'a [SyncRule]) -> Self {
        Self { rules }
    }

    /// Partition the directories below `root` between the rules.
    ///
    /// # Errors
    ///
    /// - [`Error::SyncRootMissing`] when `root` is not a directory.
    /// - [`Error::PartitioningAbort`] when any rule has an unrecognized sort
    ///   method. No partial assignment is returned in that case.
    pub fn partition(&self, root: &Path) -> Result<DesiredAssignment> {
        if !root.is_dir() {
            return Err(Error::SyncRootMissing {
                path: root.to_path_buf(),
            });
        }

        let escaped_root = Pattern::escape(&root.to_string_lossy());
        let mut claimed: BTreeSet<PathBuf> = BTreeSet::new();
        let mut assignment = DesiredAssignment::new();

        for rule in self.rules {
            let descending = match &rule.sort_method {
                SortMethod::NameHighFirst => true,
                SortMethod::NameLowFirst => false,
                SortMethod::Unrecognized(other) => {
                    tracing::error!(
                        syncname = %rule.syncname,
                        sort_method = %other,
                        "Unknown sort method, abandoning partitioning for this pass"
                    );
                    return Err(Error::PartitioningAbort {
                        syncname: rule.syncname.clone(),
                        sort_method: other.clone(),
                    });
                }
            };

            let mut candidates = expand_selector(&escaped_root, rule);
            if !rule.overlap {
                candidates.retain(|dir| !claimed.contains(dir));
            }

            candidates.sort_by(|a, b| a.to_string_lossy().cmp(&b.to_string_lossy()));
            if descending {
                candidates.reverse();
            }

            let offset = rule.sort_offset.unwrap_or(0);
            let count = rule.effective_count().unwrap_or(usize::MAX);
            let selected: Vec<PathBuf> = candidates.into_iter().skip(offset).take(count).collect();

            tracing::debug!(
                syncname = %rule.syncname,
                selected = selected.len(),
                "Rule evaluated"
            );

            claimed.extend(selected.iter().cloned());
            if !selected.is_empty() {
                assignment.insert(rule.syncname.clone(), selected);
            }
        }

        Ok(assignment)
    }
}

/// Directories below the root matching the rule's selector.
///
/// Selector and entry errors only cost this rule its matches.
fn expand_selector(escaped_root: &str, rule: &SyncRule) -> Vec<PathBuf> {
    let pattern = format!(
        "{}/{}",
        escaped_root.trim_end_matches('/'),
        rule.dir_selector.trim_start_matches('/')
    );

    let paths = match glob::glob_with(&pattern, GLOB_OPTIONS) {
        Ok(paths) => paths,
        Err(e) => {
            tracing::warn!(
                syncname = %rule.syncname,
                selector = %rule.dir_selector,
                error = %e,
                "Invalid directory selector, rule matches nothing"
            );
            return Vec::new();
        }
    };

    paths
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(syncname = %rule.syncname, error = %e, "Skipping unreadable path");
                None
            }
        })
        .filter(|path| path.is_dir())
        .collect()
}

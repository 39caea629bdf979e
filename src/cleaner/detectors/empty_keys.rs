//! Empty branches under the software roots.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const SOFTWARE: &str = "SOFTWARE";

/// Deepest level below `SOFTWARE` that is examined.
const MAX_DEPTH: usize = 4;

/// Always-populated namespaces that are never descended into.
const SKIPPED: &[&str] = &["Microsoft", "Windows", "Classes", "Policies", "Wow6432Node"];

/// Flags keys with neither values nor subkeys.
pub struct EmptyKeysDetector;

fn is_skipped(name: &str) -> bool {
    SKIPPED.iter().any(|s| s.eq_ignore_ascii_case(name))
}

impl Detector for EmptyKeysDetector {
    fn id(&self) -> &'static str {
        "empty-keys"
    }

    fn display_name(&self) -> &'static str {
        "Empty keys"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::EmptyKeys
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for root in [RootKey::CurrentUser, RootKey::LocalMachine] {
            // (path, depth below SOFTWARE)
            let mut pending: Vec<(String, usize)> = vec![(SOFTWARE.to_string(), 0)];

            while let Some((path, depth)) = pending.pop() {
                let Some(key) = ctx.open(root, &path) else {
                    continue;
                };
                // A key whose contents cannot be listed is never treated as empty.
                let children = match key.subkey_names() {
                    Ok(children) => children,
                    Err(e) => {
                        tracing::debug!("skipping {}: {}", key.path(), e);
                        continue;
                    }
                };

                if depth > 0 && children.is_empty() && matches!(key.value_count(), Ok(0)) {
                    tracing::debug!("empty key {}", key.path());
                    issues.push(self.create_issue(
                        KeyPath::new(root, &path),
                        "",
                        "Empty registry key".to_string(),
                        String::new(),
                        Severity::Low,
                        false,
                    ));
                    continue;
                }

                if depth >= MAX_DEPTH {
                    continue;
                }
                progress.report_key(root, &path, issues.len());

                for child in children.iter().rev() {
                    if !is_skipped(child) {
                        pending.push((format!("{}\\{}", path, child), depth + 1));
                    }
                }
            }
        }

        issues
    }
}

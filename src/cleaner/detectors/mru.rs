//! Most-recently-used lists.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const MRU_ROOTS: &[&str] = &[
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\ComDlg32\\OpenSaveMRU",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\ComDlg32\\LastVisitedPidlMRU",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\ComDlg32\\LastVisitedPidlMRULegacy",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\ComDlg32\\CIDSizeMRU",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RecentDocs",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RunMRU",
    "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\TypedPaths",
    "SOFTWARE\\Microsoft\\Office",
];

/// Lists longer than this are reported.
const MAX_ENTRIES: usize = 10;

const MAX_DEPTH: usize = 6;

/// Ordering values that are not list entries.
const ORDERING_VALUES: [&str; 2] = ["MRUList", "MRUListEx"];

/// Flags MRU lists holding more than [`MAX_ENTRIES`] entries.
pub struct MruDetector;

fn is_mru_branch(name: &str) -> bool {
    name.contains("MRU") || name.contains("Recent")
}

impl Detector for MruDetector {
    fn id(&self) -> &'static str {
        "mru"
    }

    fn display_name(&self) -> &'static str {
        "Recently used lists"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::MruEntry
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let root = RootKey::CurrentUser;

        for start in MRU_ROOTS {
            let mut pending: Vec<(String, usize)> = vec![(start.to_string(), 0)];

            while let Some((path, depth)) = pending.pop() {
                let Some(key) = ctx.open(root, &path) else {
                    continue;
                };
                progress.report_key(root, &path, issues.len());

                let entries = key
                    .values()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|v| v.data.is_string() || v.data.is_binary())
                    .filter(|v| !ORDERING_VALUES.iter().any(|o| o.eq_ignore_ascii_case(&v.name)))
                    .count();

                if entries > MAX_ENTRIES {
                    issues.push(self.create_issue(
                        KeyPath::new(root, &path),
                        "",
                        format!("MRU list has {} entries", entries),
                        format!("Keeps more than {} recent items", MAX_ENTRIES),
                        Severity::Low,
                        false,
                    ));
                }

                if depth >= MAX_DEPTH {
                    continue;
                }

                // Office keeps its lists a few levels down, under product and
                // version keys whose names say nothing about MRU.
                let in_office = path.contains("Office");
                for child in key.subkey_names().unwrap_or_default().iter().rev() {
                    if is_mru_branch(child) || (in_office && depth < 3) {
                        pending.push((format!("{}\\{}", path, child), depth + 1));
                    }
                }
            }
        }

        issues
    }
}

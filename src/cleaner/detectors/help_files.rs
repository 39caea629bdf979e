//! Help file registrations.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const HELP: &str = "SOFTWARE\\Microsoft\\Windows\\Help";

/// Flags help file entries whose file is gone.
pub struct HelpFileDetector;

impl Detector for HelpFileDetector {
    fn id(&self) -> &'static str {
        "help-files"
    }

    fn display_name(&self) -> &'static str {
        "Help files"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::HelpFiles
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for root in [RootKey::LocalMachine, RootKey::CurrentUser] {
            let Some(help) = ctx.open(root, HELP) else {
                continue;
            };
            progress.report_key(root, HELP, issues.len());

            for value in help.values().unwrap_or_default() {
                let Some(location) = value.data.as_str() else {
                    continue;
                };
                let path = ctx.paths.resolve_path(location);
                if path.is_empty() || ctx.paths.exists(&path) {
                    continue;
                }
                issues.push(self.create_issue(
                    KeyPath::new(root, HELP),
                    &value.name,
                    format!("Help file not found: {}", value.name),
                    format!("Path: {}", path),
                    Severity::Low,
                    true,
                ));
            }
        }

        issues
    }
}

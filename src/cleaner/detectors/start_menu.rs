//! Recent-document lists per file type.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const RECENT_DOCS: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\RecentDocs";

const MAX_VALUES: usize = 50;

/// Flags `RecentDocs\<ext>` lists that have grown past [`MAX_VALUES`].
pub struct StartMenuDetector;

impl Detector for StartMenuDetector {
    fn id(&self) -> &'static str {
        "start-menu"
    }

    fn display_name(&self) -> &'static str {
        "Start menu recent documents"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::StartMenu
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let root = RootKey::CurrentUser;
        let Some(recent) = ctx.open(root, RECENT_DOCS) else {
            return issues;
        };

        for ext in recent.subkey_names().unwrap_or_default() {
            let path = format!("{}\\{}", RECENT_DOCS, ext);
            progress.report_key(root, &path, issues.len());

            let count = ctx
                .open(root, &path)
                .and_then(|k| k.value_count().ok())
                .unwrap_or(0);
            if count > MAX_VALUES {
                issues.push(self.create_issue(
                    KeyPath::new(root, &path),
                    "",
                    format!("Too many recent documents for {}", ext),
                    format!("{} entries", count),
                    Severity::Low,
                    false,
                ));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detectors::fixture::Fixture;
    use crate::hive::ValueData;

    const RECENT: &str = r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\RecentDocs";

    fn fill(fx: &Fixture, ext: &str, count: u8) {
        let key = format!(r"{}\{}", RECENT, ext);
        for i in 0..count {
            fx.put(&key, &i.to_string(), ValueData::Binary(vec![i]));
        }
    }

    #[test]
    fn test_only_lists_over_threshold_are_flagged() {
        let fx = Fixture::new();
        fill(&fx, ".txt", 51);
        fill(&fx, ".pdf", 50);

        let issues = fx.scan(&StartMenuDetector);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key.leaf(), ".txt");
        assert_eq!(issues[0].details, "51 entries");
    }
}

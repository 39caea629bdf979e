//! Typed URL and Explorer address bar history.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const TYPED_URLS: &str = "SOFTWARE\\Microsoft\\Internet Explorer\\TypedURLs";
const TYPED_PATHS: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\TypedPaths";

const MAX_TYPED_URLS: usize = 10;

/// Flags long typed-URL histories and address bar history that refers to
/// local paths which are gone.
pub struct BrowserHistoryDetector;

impl BrowserHistoryDetector {
    fn scan_typed_urls(&self, ctx: &ScanContext<'_>, issues: &mut Vec<Issue>) {
        let Some(urls) = ctx.open(RootKey::CurrentUser, TYPED_URLS) else {
            return;
        };
        let count = urls.value_count().unwrap_or(0);
        if count > MAX_TYPED_URLS {
            issues.push(self.create_issue(
                KeyPath::new(RootKey::CurrentUser, TYPED_URLS),
                "",
                format!("Typed URL history has {} entries", count),
                String::new(),
                Severity::Low,
                false,
            ));
        }
    }

    fn scan_typed_paths(&self, ctx: &ScanContext<'_>, issues: &mut Vec<Issue>) {
        let Some(paths) = ctx.open(RootKey::CurrentUser, TYPED_PATHS) else {
            return;
        };
        let missing = paths
            .values()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.data.as_str().map(str::to_owned))
            .filter(|p| !p.is_empty() && !p.contains("://"))
            .filter(|p| !ctx.paths.exists(&ctx.paths.resolve_path(p)))
            .count();

        if missing > 0 {
            issues.push(self.create_issue(
                KeyPath::new(RootKey::CurrentUser, TYPED_PATHS),
                "",
                format!("Typed path history has {} missing locations", missing),
                String::new(),
                Severity::Low,
                false,
            ));
        }
    }
}

impl Detector for BrowserHistoryDetector {
    fn id(&self) -> &'static str {
        "browser-history"
    }

    fn display_name(&self) -> &'static str {
        "Browser history"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::BrowserHistory
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        progress.report_key(RootKey::CurrentUser, TYPED_URLS, 0);
        self.scan_typed_urls(ctx, &mut issues);
        progress.report_key(RootKey::CurrentUser, TYPED_PATHS, issues.len());
        self.scan_typed_paths(ctx, &mut issues);
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detectors::fixture::Fixture;

    const URLS: &str = r"HKCU\SOFTWARE\Microsoft\Internet Explorer\TypedURLs";
    const PATHS: &str = r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\TypedPaths";

    #[test]
    fn test_typed_urls_over_threshold() {
        let fx = Fixture::new();
        for i in 1..=11 {
            fx.put_str(URLS, &format!("url{}", i), &format!("https://example.com/{}", i));
        }

        let issues = fx.scan(&BrowserHistoryDetector);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, Fixture::key(URLS));
        assert_eq!(issues[0].category, IssueCategory::BrowserHistory);
    }

    #[test]
    fn test_typed_urls_at_threshold_are_fine() {
        let fx = Fixture::new();
        for i in 1..=10 {
            fx.put_str(URLS, &format!("url{}", i), "https://example.com");
        }

        assert!(fx.scan(&BrowserHistoryDetector).is_empty());
    }

    #[test]
    fn test_typed_paths_with_missing_location() {
        let fx = Fixture::new();
        fx.put_str(PATHS, "url1", &fx.existing_dir("Projects"));
        fx.put_str(PATHS, "url2", "ftp://server/share");
        fx.put_str(PATHS, "url3", &fx.missing_file("Old"));

        let issues = fx.scan(&BrowserHistoryDetector);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, Fixture::key(PATHS));
        assert!(issues[0].description.contains('1'));
    }
}

//! Application path registrations.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const APP_PATHS: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\App Paths";

/// Flags `App Paths\<app>` entries whose executable no longer exists.
///
/// The default value holds the executable path, possibly quoted and with
/// environment placeholders.
pub struct AppPathsDetector;

impl Detector for AppPathsDetector {
    fn id(&self) -> &'static str {
        "app-paths"
    }

    fn display_name(&self) -> &'static str {
        "Application paths"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::AppPaths
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for root in [RootKey::LocalMachine, RootKey::CurrentUser] {
            let Some(parent) = ctx.open(root, APP_PATHS) else {
                continue;
            };

            for app in parent.subkey_names().unwrap_or_default() {
                let path = format!("{}\\{}", APP_PATHS, app);
                progress.report_key(root, &path, issues.len());

                let Some(target) = ctx
                    .open(root, &path)
                    .and_then(|key| key.value(""))
                    .map(|data| ctx.paths.resolve_path(&data.as_string()))
                else {
                    continue;
                };

                if !target.is_empty() && !ctx.paths.target_exists(&target) {
                    issues.push(self.create_issue(
                        KeyPath::new(root, &path),
                        "",
                        format!("Application not found: {}", app),
                        format!("Path: {}", target),
                        Severity::Medium,
                        false,
                    ));
                }
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detectors::fixture::Fixture;

    const HKLM_APP: &str = r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths";

    #[test]
    fn test_missing_executable_is_one_medium_issue() {
        let fx = Fixture::new();
        let missing = fx.missing_file("Gone\\gone.exe");
        fx.put_str(&format!(r"{}\gone.exe", HKLM_APP), "", &format!("\"{}\"", missing));

        let issues = fx.scan(&AppPathsDetector);

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.severity, Severity::Medium);
        assert_eq!(issue.category, IssueCategory::AppPaths);
        assert!(issue.description.contains("gone.exe"));
        assert_eq!(issue.key.leaf(), "gone.exe");
        assert!(!issue.is_value_issue);
    }

    #[test]
    fn test_existing_executable_is_clean() {
        let fx = Fixture::new();
        let exe = fx.existing_file("App/app.exe");
        fx.put_str(&format!(r"{}\app.exe", HKLM_APP), "", &exe);

        assert!(fx.scan(&AppPathsDetector).is_empty());
    }

    #[test]
    fn test_expands_environment_variables() {
        let fx = Fixture::new();
        fx.existing_file("Tools/tool.exe");
        fx.put_str(
            r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\tool.exe",
            "",
            "%TESTROOT%/Tools/tool.exe",
        );

        assert!(fx.scan(&AppPathsDetector).is_empty());
    }

    #[test]
    fn test_entry_without_default_value_is_ignored() {
        let fx = Fixture::new();
        fx.put_str(&format!(r"{}\noval.exe", HKLM_APP), "Path", "C:\\nowhere");

        assert!(fx.scan(&AppPathsDetector).is_empty());
    }
}

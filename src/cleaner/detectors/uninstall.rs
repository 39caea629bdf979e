//! Add/Remove Programs entries.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyHandle, KeyPath, RootKey};

const UNINSTALL_KEYS: &[(RootKey, &str)] = &[
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall"),
    (RootKey::LocalMachine, "SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Uninstall"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall"),
];

/// Flags uninstall entries left behind by software that is no longer
/// installed.
///
/// An entry is valid when its uninstaller, its quiet uninstaller or its
/// install directory still exists. System components and updates are
/// never reported.
pub struct UninstallDetector;

impl UninstallDetector {
    fn is_excluded(entry: &dyn KeyHandle) -> bool {
        let system_component = entry.value("SystemComponent").and_then(|d| d.as_dword()) == Some(1);
        let is_update = entry
            .value("ReleaseType")
            .map(|d| d.as_string())
            .is_some_and(|t| t.contains("Update") || t.contains("Hotfix"));
        system_component || is_update
    }

    fn is_valid(ctx: &ScanContext<'_>, entry: &dyn KeyHandle) -> bool {
        let command_exists = |name: &str| {
            entry
                .value(name)
                .and_then(|d| ctx.paths.resolve_command(&d.as_string()))
                .is_some_and(|target| ctx.paths.target_exists(&target))
        };
        let location_exists = entry
            .value("InstallLocation")
            .map(|d| ctx.paths.resolve_path(&d.as_string()))
            .is_some_and(|dir| ctx.paths.dir_exists(&dir));

        command_exists("UninstallString") || command_exists("QuietUninstallString") || location_exists
    }
}

impl Detector for UninstallDetector {
    fn id(&self) -> &'static str {
        "uninstall"
    }

    fn display_name(&self) -> &'static str {
        "Uninstall entries"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::UninstallEntry
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for (root, parent) in UNINSTALL_KEYS {
            let Some(entries) = ctx.open(*root, parent) else {
                continue;
            };

            for name in entries.subkey_names().unwrap_or_default() {
                let path = format!("{}\\{}", parent, name);
                progress.report_key(*root, &path, issues.len());

                let key = KeyPath::new(*root, &path);
                if ctx.guard.is_protected(&key) {
                    continue;
                }
                let Some(entry) = ctx.open(*root, &path) else {
                    continue;
                };
                if Self::is_excluded(entry.as_ref()) || Self::is_valid(ctx, entry.as_ref()) {
                    continue;
                }

                let display_name = entry
                    .value("DisplayName")
                    .map(|d| d.as_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "(unnamed)".to_string());

                issues.push(self.create_issue(
                    key,
                    "",
                    format!("Uninstalled program: {}", display_name),
                    format!("Entry: {}", name),
                    Severity::Medium,
                    false,
                ));
            }
        }

        issues
    }
}

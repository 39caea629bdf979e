//! Auto-run entries.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const RUN_KEYS: &[(RootKey, &str)] = &[
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce"),
    (RootKey::LocalMachine, "SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\Run"),
    (RootKey::LocalMachine, "SOFTWARE\\WOW6432Node\\Microsoft\\Windows\\CurrentVersion\\RunOnce"),
];

/// Flags `Run`/`RunOnce` entries that launch a missing program.
///
/// Protected value names and commands that mention system locations are
/// never reported.
pub struct StartupDetector;

impl Detector for StartupDetector {
    fn id(&self) -> &'static str {
        "startup"
    }

    fn display_name(&self) -> &'static str {
        "Startup entries"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::StartupEntry
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for (root, path) in RUN_KEYS {
            let Some(key) = ctx.open(*root, path) else {
                continue;
            };
            progress.report_key(*root, path, issues.len());

            for value in key.values().unwrap_or_default() {
                let Some(command) = value.data.as_str().filter(|c| !c.is_empty()) else {
                    continue;
                };
                if ctx.guard.is_protected_value(&value.name) {
                    continue;
                }
                let Some(target) = ctx.paths.resolve_command(command) else {
                    continue;
                };
                if ctx.guard.contains_critical_keyword(&target) || ctx.paths.target_exists(&target) {
                    continue;
                }

                tracing::debug!("startup entry {} points at missing {}", value.name, target);
                issues.push(self.create_issue(
                    KeyPath::new(*root, *path),
                    &value.name,
                    format!("Startup program not found: {}", value.name),
                    format!("Path: {}", target),
                    Severity::Medium,
                    true,
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

    const HKCU_RUN: &str = r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Run";
    const WOW_RUN_ONCE: &str = r"HKLM\SOFTWARE\WOW6432Node\Microsoft\Windows\CurrentVersion\RunOnce";

    #[test]
    fn test_missing_program_is_medium_value_issue() {
        let fx = Fixture::new();
        let gone = fx.missing_file("Updater/updater.exe");
        fx.put_str(HKCU_RUN, "Updater", &format!("\"{}\" /silent", gone));
        fx.put_str(HKCU_RUN, "Kept", &fx.existing_file("Kept/kept.exe"));

        let issues = fx.scan(&StartupDetector);

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.value_name, "Updater");
        assert_eq!(issue.severity, Severity::Medium);
        assert!(issue.is_value_issue);
        assert!(issue.details.starts_with("Path: "));
    }

    #[test]
    fn test_wow64_run_once_is_scanned() {
        let fx = Fixture::new();
        fx.put_str(WOW_RUN_ONCE, "Setup", &fx.missing_file("setup.exe"));

        let issues = fx.scan(&StartupDetector);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, Fixture::key(WOW_RUN_ONCE));
    }

    #[test]
    fn test_system_commands_and_protected_names_are_skipped() {
        let fx = Fixture::new();
        fx.put_str(HKCU_RUN, "Defender", r"C:\Windows\System32\gone.exe");
        fx.put_str(HKCU_RUN, "Path", &fx.missing_file("path.exe"));
        fx.put_str(HKCU_RUN, "Empty", "");
        fx.put(HKCU_RUN, "Number", ValueData::DWord(1));

        assert!(fx.scan(&StartupDetector).is_empty());
    }
}

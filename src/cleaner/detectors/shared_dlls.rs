//! Shared library reference counts.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const SHARED_DLLS: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\SharedDLLs";

/// Flags `SharedDLLs` entries for missing files and entries whose
/// reference count has dropped to zero.
///
/// Value names are file paths; the data is a DWORD reference count.
pub struct SharedDllDetector;

impl Detector for SharedDllDetector {
    fn id(&self) -> &'static str {
        "shared-dlls"
    }

    fn display_name(&self) -> &'static str {
        "Shared DLLs"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::SharedDll
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(shared) = ctx.open(RootKey::LocalMachine, SHARED_DLLS) else {
            return issues;
        };
        progress.report_key(RootKey::LocalMachine, SHARED_DLLS, 0);

        for value in shared.values().unwrap_or_default() {
            let file = value.name.as_str();
            if file.is_empty() || ctx.guard.contains_critical_keyword(file) {
                continue;
            }
            let count = value.data.as_dword();

            let (description, severity) = if !ctx.paths.file_exists(file) {
                ("Shared DLL not found".to_string(), Severity::Low)
            } else if count == Some(0) {
                ("Shared DLL has zero references".to_string(), Severity::Low)
            } else {
                continue;
            };

            issues.push(self.create_issue(
                KeyPath::new(RootKey::LocalMachine, SHARED_DLLS),
                file,
                description,
                format!("References: {}", count.map_or_else(|| "?".to_string(), |c| c.to_string())),
                severity,
                true,
            ));
        }

        issues
    }
}

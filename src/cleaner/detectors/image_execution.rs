//! Image File Execution Options debugger hooks.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const IFEO: &str = "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Image File Execution Options";

/// Flags `Debugger` hooks that launch a missing program.
pub struct ImageExecutionDetector;

impl Detector for ImageExecutionDetector {
    fn id(&self) -> &'static str {
        "image-execution"
    }

    fn display_name(&self) -> &'static str {
        "Image file execution options"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::ImageExecution
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(options) = ctx.open(RootKey::LocalMachine, IFEO) else {
            return issues;
        };

        for image in options.subkey_names().unwrap_or_default() {
            let path = format!("{}\\{}", IFEO, image);
            progress.report_key(RootKey::LocalMachine, &path, issues.len());

            let Some(debugger) = ctx.open(RootKey::LocalMachine, &path).and_then(|k| k.value("Debugger")) else {
                continue;
            };
            let command = debugger.as_string();
            let Some(target) = ctx.paths.resolve_command(&command) else {
                continue;
            };
            if ctx.paths.target_exists(&target) {
                continue;
            }

            issues.push(self.create_issue(
                KeyPath::new(RootKey::LocalMachine, &path),
                "Debugger",
                format!("Debugger not found for {}", image),
                format!("Debugger: {}", command),
                Severity::Medium,
                true,
            ));
        }

        issues
    }
}

//! File extension to ProgID associations.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey, DEFAULT_VALUE_LABEL};

/// Extensions owned by the system; their associations are never reported.
const SYSTEM_EXTENSIONS: &[&str] = &[
    ".exe", ".dll", ".bat", ".cmd", ".com", ".lnk", ".msi", ".txt", ".doc", ".docx", ".pdf", ".jpg",
    ".png", ".gif", ".htm", ".html", ".xml", ".zip", ".rar", ".7z",
];

/// Flags `HKCR\.<ext>` associations whose handler chain is broken.
///
/// Either the ProgID named by the default value is not registered, or its
/// `shell\open\command` launches a program that is gone.
pub struct FileExtensionDetector;

fn is_system_extension(ext: &str) -> bool {
    SYSTEM_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext))
}

impl FileExtensionDetector {
    fn check_extension(&self, ctx: &ScanContext<'_>, ext: &str) -> Option<Issue> {
        let prog_id = ctx.open(RootKey::ClassesRoot, ext)?.value("")?.as_string();
        if prog_id.is_empty() {
            return None;
        }

        let key = KeyPath::new(RootKey::ClassesRoot, ext);
        if !ctx.key_exists(RootKey::ClassesRoot, &prog_id) {
            return Some(self.create_issue(
                key,
                DEFAULT_VALUE_LABEL,
                format!("Invalid file association: {}", ext),
                format!("ProgID not registered: {}", prog_id),
                Severity::Medium,
                true,
            ));
        }

        let command_path = format!("{}\\shell\\open\\command", prog_id);
        let command = ctx.open(RootKey::ClassesRoot, &command_path)?.value("")?.as_string();
        let target = ctx.paths.resolve_command(&command)?;

        if ctx.paths.target_exists(&target) {
            return None;
        }
        Some(self.create_issue(
            key,
            DEFAULT_VALUE_LABEL,
            format!("Association handler not found: {}", ext),
            format!("Command: {}", command),
            Severity::Low,
            true,
        ))
    }
}

impl Detector for FileExtensionDetector {
    fn id(&self) -> &'static str {
        "file-extensions"
    }

    fn display_name(&self) -> &'static str {
        "File extensions"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::FileExtension
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(classes) = ctx.open(RootKey::ClassesRoot, "") else {
            return issues;
        };

        for name in classes.subkey_names().unwrap_or_default() {
            if !name.starts_with('.') || is_system_extension(&name) {
                continue;
            }
            if ctx.guard.is_protected(&KeyPath::new(RootKey::ClassesRoot, &name)) {
                continue;
            }
            progress.report_key(RootKey::ClassesRoot, &name, issues.len());

            if let Some(issue) = self.check_extension(ctx, &name) {
                issues.push(issue);
            }
        }

        issues
    }
}

//! Shell extensions and context menu handlers.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const APPROVED: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Shell Extensions\\Approved";
const HANDLER_OWNERS: [&str; 3] = ["*", "Directory", "Folder"];

/// Flags shell extension registrations pointing at COM classes that no
/// longer exist.
pub struct ContextMenuDetector;

fn is_clsid(text: &str) -> bool {
    text.starts_with('{') && text.ends_with('}')
}

fn class_exists(ctx: &ScanContext<'_>, clsid: &str) -> bool {
    ctx.key_exists(RootKey::ClassesRoot, &format!("CLSID\\{}", clsid))
}

impl ContextMenuDetector {
    fn scan_approved(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>, issues: &mut Vec<Issue>) {
        for root in [RootKey::LocalMachine, RootKey::CurrentUser] {
            let Some(key) = ctx.open(root, APPROVED) else {
                continue;
            };
            progress.report_key(root, APPROVED, issues.len());

            for value in key.values().unwrap_or_default() {
                if !is_clsid(&value.name) || class_exists(ctx, &value.name) {
                    continue;
                }
                issues.push(self.create_issue(
                    KeyPath::new(root, APPROVED),
                    &value.name,
                    format!("Approved shell extension has no class: {}", value.name),
                    value.data.as_string(),
                    Severity::Low,
                    true,
                ));
            }
        }
    }

    fn scan_handlers(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>, issues: &mut Vec<Issue>) {
        for owner in HANDLER_OWNERS {
            let parent = format!("{}\\shellex\\ContextMenuHandlers", owner);
            let Some(handlers) = ctx.open(RootKey::ClassesRoot, &parent) else {
                continue;
            };

            for handler in handlers.subkey_names().unwrap_or_default() {
                let path = format!("{}\\{}", parent, handler);
                progress.report_key(RootKey::ClassesRoot, &path, issues.len());

                // The class id is the default value, or the key name itself.
                let clsid = ctx
                    .open(RootKey::ClassesRoot, &path)
                    .and_then(|key| key.value(""))
                    .map(|data| data.as_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| handler.clone());

                if !clsid.starts_with('{') || class_exists(ctx, &clsid) {
                    continue;
                }
                issues.push(self.create_issue(
                    KeyPath::new(RootKey::ClassesRoot, &path),
                    "",
                    format!("Context menu handler has no class: {}", handler),
                    format!("CLSID: {}", clsid),
                    Severity::Medium,
                    false,
                ));
            }
        }
    }
}

impl Detector for ContextMenuDetector {
    fn id(&self) -> &'static str {
        "context-menu"
    }

    fn display_name(&self) -> &'static str {
        "Context menu handlers"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::ContextMenu
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        self.scan_approved(ctx, progress, &mut issues);
        self.scan_handlers(ctx, progress, &mut issues);
        issues
    }
}

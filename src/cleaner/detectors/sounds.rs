//! Sound event files.

use std::path::PathBuf;

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{is_bare_name, KeyPath, RootKey};

const APPS: &str = "AppEvents\\Schemes\\Apps";

/// Flags sound events whose current `.wav` file is gone.
pub struct SoundEventDetector;

impl Detector for SoundEventDetector {
    fn id(&self) -> &'static str {
        "sounds"
    }

    fn display_name(&self) -> &'static str {
        "Sound events"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Sounds
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let root = RootKey::CurrentUser;
        let Some(apps) = ctx.open(root, APPS) else {
            return issues;
        };
        let media_dir = PathBuf::from(ctx.paths.windows_dir()).join("Media");

        for app in apps.subkey_names().unwrap_or_default() {
            let app_path = format!("{}\\{}", APPS, app);
            progress.report_key(root, &app_path, issues.len());

            let Some(events) = ctx.open(root, &app_path) else {
                continue;
            };
            for event in events.subkey_names().unwrap_or_default() {
                let current = format!("{}\\{}\\.Current", app_path, event);
                let Some(sound) = ctx
                    .open(root, &current)
                    .and_then(|k| k.value(""))
                    .map(|d| d.as_string())
                    .filter(|s| !s.is_empty())
                else {
                    continue;
                };

                let file = if is_bare_name(&sound) {
                    media_dir.join(&sound).display().to_string()
                } else {
                    ctx.paths.resolve_path(&sound)
                };
                if ctx.paths.file_exists(&file) {
                    continue;
                }

                issues.push(self.create_issue(
                    KeyPath::new(root, &current),
                    "",
                    format!("Sound file not found: {}\\{}", app, event),
                    format!("File: {}", file),
                    Severity::Low,
                    false,
                ));
            }
        }

        issues
    }
}

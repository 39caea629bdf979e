//! Font file registrations.

use std::path::PathBuf;

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{is_bare_name, KeyPath, RootKey};

const FONTS: &str = "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion\\Fonts";

/// Flags installed fonts whose file is gone.
pub struct FontDetector;

impl Detector for FontDetector {
    fn id(&self) -> &'static str {
        "fonts"
    }

    fn display_name(&self) -> &'static str {
        "Fonts"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Fonts
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(fonts) = ctx.open(RootKey::LocalMachine, FONTS) else {
            return issues;
        };
        progress.report_key(RootKey::LocalMachine, FONTS, 0);

        let fonts_dir = PathBuf::from(ctx.paths.windows_dir()).join("Fonts");

        for value in fonts.values().unwrap_or_default() {
            let file = value.data.as_string();
            if file.is_empty() {
                continue;
            }

            // Bare names live in the Fonts directory.
            let path = if is_bare_name(&file) && !file.contains(':') {
                fonts_dir.join(&file).display().to_string()
            } else {
                ctx.paths.expand_env(&file)
            };

            if !ctx.paths.file_exists(&path) {
                issues.push(self.create_issue(
                    KeyPath::new(RootKey::LocalMachine, FONTS),
                    &value.name,
                    format!("Font file not found: {}", file),
                    format!("Path: {}", path),
                    Severity::Low,
                    true,
                ));
            }
        }

        issues
    }
}

//! COM class and type library registrations.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const SERVER_KEYS: [&str; 2] = ["InprocServer32", "LocalServer32"];
const TYPELIB_PLATFORMS: [&str; 2] = ["0\\win32", "0\\win64"];

/// Flags COM servers and type libraries whose files are gone.
pub struct ActiveXDetector;

impl ActiveXDetector {
    /// Issue when the default value of `path` names a missing file.
    fn check_file_reference(
        &self,
        ctx: &ScanContext<'_>,
        path: &str,
        what: &str,
        severity: Severity,
    ) -> Option<Issue> {
        let key = ctx.open(RootKey::ClassesRoot, path)?;
        let command = key.value("")?.as_string();
        let target = ctx.paths.resolve_command(&command)?;

        if ctx.paths.target_exists(&target) {
            return None;
        }

        Some(self.create_issue(
            KeyPath::new(RootKey::ClassesRoot, path),
            "",
            format!("{} not found: {}", what, target),
            String::new(),
            severity,
            false,
        ))
    }

    fn scan_classes(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>, issues: &mut Vec<Issue>) {
        let Some(classes) = ctx.open(RootKey::ClassesRoot, "CLSID") else {
            return;
        };

        for clsid in classes.subkey_names().unwrap_or_default() {
            let class_path = format!("CLSID\\{}", clsid);
            progress.report_key(RootKey::ClassesRoot, &class_path, issues.len());

            for server in SERVER_KEYS {
                let server_path = format!("{}\\{}", class_path, server);
                if let Some(issue) = self.check_file_reference(ctx, &server_path, "COM server", Severity::Medium) {
                    issues.push(issue);
                }
            }
        }
    }

    fn scan_type_libraries(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>, issues: &mut Vec<Issue>) {
        let Some(libraries) = ctx.open(RootKey::ClassesRoot, "TypeLib") else {
            return;
        };

        for library in libraries.subkey_names().unwrap_or_default() {
            let library_path = format!("TypeLib\\{}", library);
            progress.report_key(RootKey::ClassesRoot, &library_path, issues.len());

            let Some(versions) = ctx.open(RootKey::ClassesRoot, &library_path) else {
                continue;
            };

            for version in versions.subkey_names().unwrap_or_default() {
                for platform in TYPELIB_PLATFORMS {
                    let path = format!("{}\\{}\\{}", library_path, version, platform);
                    if let Some(issue) = self.check_file_reference(ctx, &path, "Type library", Severity::Low) {
                        issues.push(issue);
                    }
                }
            }
        }
    }
}

impl Detector for ActiveXDetector {
    fn id(&self) -> &'static str {
        "activex"
    }

    fn display_name(&self) -> &'static str {
        "ActiveX/COM components"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::ActiveX
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        self.scan_classes(ctx, progress, &mut issues);
        self.scan_type_libraries(ctx, progress, &mut issues);
        issues
    }
}

//! Core trait and types for registry issue detection.

use crate::cleaner::issue::{Issue, IssueCategory, Severity};
use crate::guard::ProtectedPathGuard;
use crate::hive::{Access, KeyHandle, KeyPath, KeyStore, PathResolver, RootKey};

/// Everything a detector reads from during a scan.
#[derive(Clone, Copy)]
pub struct ScanContext<'a> {
    pub store: &'a dyn KeyStore,
    pub paths: &'a PathResolver,
    pub guard: &'a ProtectedPathGuard,
}

impl<'a> ScanContext<'a> {
    pub fn new(store: &'a dyn KeyStore, paths: &'a PathResolver, guard: &'a ProtectedPathGuard) -> Self {
        Self { store, paths, guard }
    }

    /// Open a key read-only. Missing or unreadable keys yield `None`.
    pub fn open(&self, root: RootKey, path: &str) -> Option<Box<dyn KeyHandle + 'a>> {
        let store: &'a dyn KeyStore = self.store;
        match store.open(root, path, Access::Read) {
            Ok(handle) => Some(handle),
            Err(e) => {
                if !e.is_not_found() {
                    tracing::debug!("skipping {}: {}", KeyPath::new(root, path), e);
                }
                None
            }
        }
    }

    pub fn key_exists(&self, root: RootKey, path: &str) -> bool {
        self.store.key_exists(root, path)
    }
}

/// Progress callback: current key, issues found so far.
pub type ScanProgressFn<'a> = dyn Fn(&str, usize) + Sync + 'a;

/// Optional progress sink; without a callback every report is a no-op.
#[derive(Clone, Copy, Default)]
pub struct ScanReporter<'a> {
    callback: Option<&'a ScanProgressFn<'a>>,
}

impl<'a> ScanReporter<'a> {
    pub fn new(callback: &'a ScanProgressFn<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn silent() -> Self {
        Self { callback: None }
    }

    pub fn report(&self, current_key: &str, issues_found: usize) {
        if let Some(callback) = self.callback {
            callback(current_key, issues_found);
        }
    }

    pub fn report_key(&self, root: RootKey, path: &str, issues_found: usize) {
        if self.callback.is_some() {
            self.report(&KeyPath::new(root, path).to_string(), issues_found);
        }
    }
}

/// A read-only check over one area of the store.
///
/// Detectors keep no state between scans and never write to the store.
/// A detector whose starting key cannot be opened returns no issues.
pub trait Detector: Send + Sync {
    /// Stable identifier used in configuration and on the command line.
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    fn category(&self) -> IssueCategory;

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue>;

    /// Build an issue in this detector's category.
    fn create_issue(
        &self,
        key: KeyPath,
        value_name: &str,
        description: String,
        details: String,
        severity: Severity,
        is_value_issue: bool,
    ) -> Issue {
        Issue {
            key,
            value_name: value_name.to_string(),
            description,
            details,
            category: self.category(),
            severity,
            is_value_issue,
        }
    }
}

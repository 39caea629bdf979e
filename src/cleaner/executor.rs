//! Per-issue delete pipeline with force-mode escalation.

use std::fmt;

use crate::cleaner::privilege::ForceDeleter;
use crate::cleaner::{Issue, Severity};
use crate::error::{StoreError, StoreResult};
use crate::guard::ProtectedPathGuard;
use crate::hive::{store_value_name, Access, KeyStore};

/// Result of cleaning a single issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanOutcome {
    /// Removed by a normal delete.
    Cleaned,
    /// Removed after taking ownership and granting access.
    Forced,
    /// Left in place; removal is queued for next startup.
    Scheduled,
    Skipped(String),
    Failed(String),
}

impl CleanOutcome {
    /// Whether the issue counts as cleaned.
    pub fn is_cleaned(&self) -> bool {
        matches!(self, CleanOutcome::Cleaned | CleanOutcome::Forced | CleanOutcome::Scheduled)
    }
}

impl fmt::Display for CleanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanOutcome::Cleaned => write!(f, "cleaned"),
            CleanOutcome::Forced => write!(f, "force-deleted"),
            CleanOutcome::Scheduled => write!(f, "scheduled for reboot"),
            CleanOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            CleanOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Options for the clean pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanOptions {
    /// Write a backup before the first delete.
    pub create_backup: bool,
    /// Escalate denied deletes to force and reboot-time deletion.
    pub force_delete: bool,
    /// Run every check but leave the store untouched.
    pub dry_run: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            force_delete: false,
            dry_run: false,
        }
    }
}

/// Resolves one issue to exactly one [`CleanOutcome`].
pub struct CleanExecutor<'a> {
    store: &'a dyn KeyStore,
    guard: &'a ProtectedPathGuard,
    options: CleanOptions,
}

impl<'a> CleanExecutor<'a> {
    pub fn new(store: &'a dyn KeyStore, guard: &'a ProtectedPathGuard, options: CleanOptions) -> Self {
        Self { store, guard, options }
    }

    /// Guard check, severity check, normal delete, then (in force mode)
    /// force delete and finally reboot-time scheduling.
    pub fn execute(&self, issue: &Issue) -> CleanOutcome {
        if self.guard.is_protected(&issue.key) {
            tracing::debug!("skipping protected {}", issue.location());
            return CleanOutcome::Skipped("protected location".to_string());
        }
        if issue.severity == Severity::Critical {
            return CleanOutcome::Skipped("critical issues are never removed automatically".to_string());
        }
        if self.options.dry_run {
            return CleanOutcome::Cleaned;
        }

        let error = match self.delete(issue) {
            Ok(()) => return CleanOutcome::Cleaned,
            Err(StoreError::NotFound(_)) => {
                return CleanOutcome::Skipped("no longer present".to_string());
            }
            Err(e) => e,
        };

        if !self.options.force_delete {
            tracing::warn!("Failed to delete {}: {}", issue.location(), error);
            return CleanOutcome::Failed(error.to_string());
        }

        let deleter = ForceDeleter::new(self.store);
        let value = issue.targets_value().then(|| store_value_name(&issue.value_name));

        let attempt = match value {
            Some(name) => deleter.force_delete_value(&issue.key, name),
            None => deleter.force_delete_key(&issue.key),
        };
        let force_error = match attempt.result {
            Ok(()) => return CleanOutcome::Forced,
            Err(e) => e,
        };
        tracing::debug!(
            "force delete of {} failed (ownership: {}, access: {}): {}",
            issue.location(),
            attempt.ownership_taken,
            attempt.access_granted,
            force_error
        );

        match deleter.schedule_delete_on_reboot(&issue.key, value) {
            Ok(_) => CleanOutcome::Scheduled,
            Err(schedule_error) => {
                tracing::warn!("Failed to delete {}: {}", issue.location(), error);
                CleanOutcome::Failed(format!(
                    "{}; force delete: {}; scheduling: {}",
                    error, force_error, schedule_error
                ))
            }
        }
    }

    /// Normal delete of the issue target.
    ///
    /// Keys are removed through their parent with a non-recursive delete,
    /// falling back to a subtree delete only when the key has children.
    pub fn delete(&self, issue: &Issue) -> StoreResult<()> {
        if issue.targets_value() {
            return self
                .store
                .open_path(&issue.key, Access::Write)?
                .delete_value(store_value_name(&issue.value_name));
        }

        let (parent, leaf) = issue
            .key
            .split_leaf()
            .ok_or_else(|| StoreError::InvalidPath(issue.key.to_string()))?;
        let handle = self.store.open(issue.key.root, parent, Access::Write)?;

        match handle.delete_subkey(leaf) {
            Err(StoreError::HasChildren(_)) => handle.delete_subkey_tree(leaf),
            other => other,
        }
    }
}

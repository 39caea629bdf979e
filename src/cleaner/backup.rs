//! Recovery files written before a destructive clean.
//!
//! A backup holds the issue list about to be acted on and, optionally, the
//! state of every targeted key or value so it can be put back later.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::cleaner::Issue;
use crate::error::BackupError;
use crate::hive::{capture, restore, store_value_name, KeyPath, KeySnapshot, KeyStore, Value};

/// Current artifact format version.
pub const BACKUP_VERSION: u32 = 1;

const FILE_PREFIX: &str = "backup_";
const FILE_EXTENSION: &str = "json";

/// Where backups go and how many are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub directory: PathBuf,
    pub max_backups: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            directory: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reg-sweeper")
                .join("backups"),
            max_backups: 10,
        }
    }
}

/// Prior state of one issue target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapturedState {
    Value { key: KeyPath, value: Value },
    Key { key: KeyPath, tree: KeySnapshot },
}

/// On-disk backup artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFile {
    pub version: u32,
    pub label: String,
    pub created_at: DateTime<Local>,
    pub issues: Vec<Issue>,
    #[serde(default)]
    pub snapshots: Vec<CapturedState>,
}

/// Outcome of replaying a backup into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    pub failed: usize,
}

/// Writes, lists, prunes and restores backup files.
#[derive(Debug, Clone)]
pub struct BackupManager {
    config: BackupConfig,
    initialized: bool,
}

impl BackupManager {
    pub fn new(config: BackupConfig) -> Self {
        Self {
            config,
            initialized: false,
        }
    }

    pub fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn directory(&self) -> &Path {
        &self.config.directory
    }

    /// Create the backup directory if needed.
    pub fn initialize(&mut self) -> Result<(), BackupError> {
        fs::create_dir_all(&self.config.directory).map_err(|source| BackupError::Directory {
            path: self.config.directory.clone(),
            source,
        })?;
        self.initialized = true;
        Ok(())
    }

    /// Serialize the issue list. Returns the path written.
    pub fn create_backup(&self, issues: &[Issue], label: &str) -> Result<PathBuf, BackupError> {
        self.write(issues, label, Vec::new())
    }

    /// Serialize the issue list together with the current state of each
    /// target, so the backup can be restored.
    pub fn create_backup_with_snapshot(
        &self,
        store: &dyn KeyStore,
        issues: &[Issue],
        label: &str,
    ) -> Result<PathBuf, BackupError> {
        let snapshots = issues.iter().filter_map(|issue| capture_target(store, issue)).collect();
        self.write(issues, label, snapshots)
    }

    fn write(&self, issues: &[Issue], label: &str, snapshots: Vec<CapturedState>) -> Result<PathBuf, BackupError> {
        if !self.initialized {
            return Err(BackupError::NotInitialized);
        }

        let created_at = Local::now();
        let path = self.unique_path(&created_at);
        let backup = BackupFile {
            version: BACKUP_VERSION,
            label: label.to_string(),
            created_at,
            issues: issues.to_vec(),
            snapshots,
        };

        let json = serde_json::to_string_pretty(&backup).map_err(|source| BackupError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| BackupError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Wrote backup of {} issues to {}", issues.len(), path.display());
        Ok(path)
    }

    fn unique_path(&self, created_at: &DateTime<Local>) -> PathBuf {
        let stem = format!("{}{}", FILE_PREFIX, created_at.format("%Y%m%d_%H%M%S_%3f"));
        let mut path = self.config.directory.join(format!("{}.{}", stem, FILE_EXTENSION));
        let mut n = 1;
        while path.exists() {
            path = self.config.directory.join(format!("{}_{}.{}", stem, n, FILE_EXTENSION));
            n += 1;
        }
        path
    }

    /// Backup files, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, BackupError> {
        let dir = &self.config.directory;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir).map_err(|source| BackupError::Read {
            path: dir.clone(),
            source,
        })?;

        let mut backups: Vec<(SystemTime, PathBuf)> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_backup_file(path))
            .map(|path| {
                let modified = fs::metadata(&path)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, path)
            })
            .collect();

        backups.sort();
        Ok(backups.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete the oldest backups until at most `max` remain. Returns how
    /// many were removed.
    pub fn cleanup_old_backups(&self, max: usize) -> Result<usize, BackupError> {
        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(max);

        for path in &backups[..excess] {
            fs::remove_file(path).map_err(|source| BackupError::Write {
                path: path.clone(),
                source,
            })?;
            tracing::debug!("Removed old backup {}", path.display());
        }

        Ok(excess)
    }

    pub fn load_backup(&self, path: &Path) -> Result<BackupFile, BackupError> {
        let content = fs::read_to_string(path).map_err(|source| BackupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| BackupError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Put every captured key and value back into `store`.
    pub fn restore_backup(&self, path: &Path, store: &dyn KeyStore) -> Result<RestoreReport, BackupError> {
        let backup = self.load_backup(path)?;
        let mut report = RestoreReport::default();

        for state in &backup.snapshots {
            let result = match state {
                CapturedState::Value { key, value } => store
                    .create(key.root, &key.subkey)
                    .and_then(|handle| handle.set_value(&value.name, &value.data)),
                CapturedState::Key { key, tree } => restore(store, key, tree).map(|_| ()),
            };

            match result {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    tracing::warn!("Failed to restore from {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            "Restored {} entries from {} ({} failed)",
            report.restored,
            path.display(),
            report.failed
        );
        Ok(report)
    }
}

fn is_backup_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(FILE_PREFIX))
}

/// Current state of an issue's target, if it still exists.
fn capture_target(store: &dyn KeyStore, issue: &Issue) -> Option<CapturedState> {
    if issue.targets_value() {
        let name = store_value_name(&issue.value_name);
        let data = store.read_value(issue.key.root, &issue.key.subkey, name)?;
        Some(CapturedState::Value {
            key: issue.key.clone(),
            value: Value::new(name, data),
        })
    } else {
        let tree = capture(store, &issue.key).ok()?;
        Some(CapturedState::Key {
            key: issue.key.clone(),
            tree,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::{IssueCategory, Severity};
    use crate::hive::{KeyPath, MemoryStore, RootKey, ValueData};
    use tempfile::TempDir;

    fn manager(dir: &TempDir, max_backups: usize) -> BackupManager {
        let mut manager = BackupManager::new(BackupConfig {
            directory: dir.path().join("backups"),
            max_backups,
        });
        manager.initialize().unwrap();
        manager
    }

    fn issue(subkey: &str, value: &str) -> Issue {
        Issue {
            key: KeyPath::new(RootKey::CurrentUser, subkey),
            value_name: value.to_string(),
            description: "test".into(),
            details: String::new(),
            category: IssueCategory::Software,
            severity: Severity::Low,
            is_value_issue: !value.is_empty(),
        }
    }

    #[test]
    fn test_create_and_load_backup() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 10);
        let issues = vec![issue(r"Software\A", "Path"), issue(r"Software\B", "")];

        let path = manager.create_backup(&issues, "before clean").unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("backup_") && name.ends_with(".json"));

        let loaded = manager.load_backup(&path).unwrap();
        assert_eq!(loaded.version, BACKUP_VERSION);
        assert_eq!(loaded.label, "before clean");
        assert_eq!(loaded.issues, issues);
        assert!(loaded.snapshots.is_empty());
    }

    #[test]
    fn test_create_without_initialize_fails() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(BackupConfig {
            directory: tmp.path().to_path_buf(),
            max_backups: 1,
        });

        let err = manager.create_backup(&[], "x").unwrap_err();
        assert!(matches!(err, BackupError::NotInitialized));
    }

    #[test]
    fn test_same_millisecond_backups_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 10);

        let paths: Vec<_> = (0..3).map(|_| manager.create_backup(&[], "x").unwrap()).collect();

        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_eq!(manager.list_backups().unwrap().len(), 3);
    }

    #[test]
    fn test_cleanup_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 2);
        let dir = manager.directory().to_path_buf();

        for name in ["backup_20240101_000000_000.json", "backup_20240102_000000_000.json", "backup_20240103_000000_000.json"] {
            fs::write(dir.join(name), "{}").unwrap();
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        fs::write(dir.join("notes.txt"), "keep me").unwrap();

        let removed = manager.cleanup_old_backups(2).unwrap();

        assert_eq!(removed, 1);
        let left: Vec<_> = manager
            .list_backups()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, ["backup_20240102_000000_000.json", "backup_20240103_000000_000.json"]);
        assert!(dir.join("notes.txt").exists());
    }

    #[test]
    fn test_list_missing_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(BackupConfig {
            directory: tmp.path().join("never-created"),
            max_backups: 3,
        });

        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_snapshot_backup_restores_value_and_key() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 10);
        let store = MemoryStore::new();
        let run = KeyPath::new(RootKey::CurrentUser, r"Software\Run");
        let app = KeyPath::new(RootKey::CurrentUser, r"Software\Vendor\App");
        store.put_value(&run, "Updater", ValueData::String("C:\\gone.exe".into()));
        store.put_value(&app.join("Sub"), "Level", ValueData::DWord(3));

        let issues = vec![issue(r"Software\Run", "Updater"), issue(r"Software\Vendor\App", "")];
        let path = manager.create_backup_with_snapshot(&store, &issues, "snap").unwrap();

        store
            .open_path(&run, crate::hive::Access::Write)
            .unwrap()
            .delete_value("Updater")
            .unwrap();
        store
            .open(RootKey::CurrentUser, r"Software\Vendor", crate::hive::Access::Write)
            .unwrap()
            .delete_subkey_tree("App")
            .unwrap();
        assert!(!store.contains_key(&app));

        let report = manager.restore_backup(&path, &store).unwrap();

        assert_eq!(report, RestoreReport { restored: 2, failed: 0 });
        assert_eq!(store.value_of(&run, "Updater"), Some(ValueData::String("C:\\gone.exe".into())));
        assert_eq!(store.value_of(&app.join("Sub"), "Level"), Some(ValueData::DWord(3)));
    }

    #[test]
    fn test_snapshot_skips_targets_already_gone() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 10);
        let store = MemoryStore::new();

        let path = manager
            .create_backup_with_snapshot(&store, &[issue(r"Software\Gone", "Value")], "x")
            .unwrap();

        let loaded = manager.load_backup(&path).unwrap();
        assert_eq!(loaded.issues.len(), 1);
        assert!(loaded.snapshots.is_empty());
    }

    #[test]
    fn test_load_malformed_backup() {
        let tmp = TempDir::new().unwrap();
        let manager = manager(&tmp, 10);
        let path = manager.directory().join("backup_bad.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(manager.load_backup(&path), Err(BackupError::Format { .. })));
    }
}

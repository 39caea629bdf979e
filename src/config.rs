use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cleaner::{known_detector_ids, BackupConfig};
use crate::error::ConfigError;
use crate::hive::KeyPath;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanConfig,
    pub clean: CleanConfig,
    pub backup: BackupSettings,
    pub guard: GuardConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Detector ids that never run
    pub disabled_detectors: Vec<String>,
    /// Run detectors on a thread pool
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanConfig {
    /// Write a backup before deleting anything
    pub create_backup: bool,
    /// Take ownership / schedule for reboot when a delete is refused
    pub force_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Directory holding backup files
    pub directory: PathBuf,
    /// Number of backup files kept; oldest are removed first
    pub max_backups: usize,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Additional keys that are never deleted, e.g. `HKCU\Software\MyCompany`
    pub extra_protected_keys: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            clean: CleanConfig::default(),
            backup: BackupSettings::default(),
            guard: GuardConfig::default(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            disabled_detectors: vec![],
            parallel: false,
        }
    }
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            create_backup: true,
            force_delete: false,
        }
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        let defaults = BackupConfig::default();
        Self {
            directory: defaults.directory,
            max_backups: defaults.max_backups,
        }
    }
}

impl BackupSettings {
    pub fn to_backup_config(&self) -> BackupConfig {
        BackupConfig {
            directory: self.directory.clone(),
            max_backups: self.max_backups,
        }
    }
}

impl GuardConfig {
    /// Parsed extra keys. Entries that do not parse are dropped; `validate`
    /// rejects them up front.
    pub fn protected_keys(&self) -> Vec<KeyPath> {
        self.extra_protected_keys
            .iter()
            .filter_map(|raw| KeyPath::parse(raw).ok())
            .collect()
    }
}

impl Config {
    /// Default config file location: `<config_dir>/reg-sweeper/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reg-sweeper").join("config.toml"))
    }

    /// Load from an explicit path, else the default location if it exists,
    /// else built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadError {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.clone(),
            source,
        })?;

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backup.max_backups == 0 {
            return Err(ConfigError::Invalid("backup.max_backups must be at least 1".into()));
        }

        let known = known_detector_ids();
        if let Some(unknown) = self
            .scan
            .disabled_detectors
            .iter()
            .find(|id| !known.contains(&id.as_str()))
        {
            return Err(ConfigError::Invalid(format!(
                "scan.disabled_detectors: unknown detector '{}'",
                unknown
            )));
        }

        if let Some(bad) = self
            .guard
            .extra_protected_keys
            .iter()
            .find(|raw| KeyPath::parse(raw).is_err())
        {
            return Err(ConfigError::Invalid(format!(
                "guard.extra_protected_keys: '{}' is not a key path",
                bad
            )));
        }

        Ok(())
    }
}

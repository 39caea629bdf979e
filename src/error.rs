use std::path::PathBuf;
use thiserror::Error;

/// Core library errors
#[derive(Error, Debug)]
pub enum SweeperError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Key store error: {0}")]
    Store(#[from] StoreError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    #[error("IO error at path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed hive file '{path}': {source}")]
    HiveFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown detector: {0}")]
    UnknownDetector(String),

    #[error("Live registry access is only available on Windows; pass a hive snapshot instead")]
    LiveRegistryUnavailable,
}

/// Failures reported by a key store. None of these abort a scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Key has subkeys: {0}")]
    HasChildren(String),

    #[error("Key is in use: {0}")]
    InUse(String),

    #[error("Invalid key path: {0}")]
    InvalidPath(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Store error {code} at '{path}'")]
    Os { code: i32, path: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, StoreError::AccessDenied(_))
    }
}

/// Backup-specific errors
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to prepare backup directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write backup '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read backup '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed backup '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backup manager is not initialized")]
    NotInitialized,
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, SweeperError>;

/// Result of a single key store call
pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = ConfigError::Invalid("max_backups must be at least 1".into());
        assert!(err.to_string().contains("max_backups"));
    }

    #[test]
    fn error_conversion() {
        let config_err = ConfigError::Invalid("test".into());
        let sweeper_err: SweeperError = config_err.into();
        assert!(matches!(sweeper_err, SweeperError::Config(_)));

        let store_err: SweeperError = StoreError::NotFound("HKLM\\X".into()).into();
        assert!(matches!(store_err, SweeperError::Store(_)));
    }

    #[test]
    fn store_error_predicates() {
        assert!(StoreError::NotFound("x".into()).is_not_found());
        assert!(StoreError::AccessDenied("x".into()).is_access_denied());
        assert!(!StoreError::InUse("x".into()).is_access_denied());
    }
}

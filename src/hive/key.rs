//! Root hives and full key paths.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Top-level namespace of the key store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RootKey {
    ClassesRoot,
    CurrentUser,
    LocalMachine,
    Users,
    CurrentConfig,
}

impl RootKey {
    pub const ALL: [RootKey; 5] = [
        RootKey::ClassesRoot,
        RootKey::CurrentUser,
        RootKey::LocalMachine,
        RootKey::Users,
        RootKey::CurrentConfig,
    ];

    /// Canonical prefix used when composing full key paths.
    pub fn canonical_name(self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKEY_CLASSES_ROOT",
            RootKey::CurrentUser => "HKEY_CURRENT_USER",
            RootKey::LocalMachine => "HKEY_LOCAL_MACHINE",
            RootKey::Users => "HKEY_USERS",
            RootKey::CurrentConfig => "HKEY_CURRENT_CONFIG",
        }
    }

    /// Short alias accepted by `reg.exe`.
    pub fn short_name(self) -> &'static str {
        match self {
            RootKey::ClassesRoot => "HKCR",
            RootKey::CurrentUser => "HKCU",
            RootKey::LocalMachine => "HKLM",
            RootKey::Users => "HKU",
            RootKey::CurrentConfig => "HKCC",
        }
    }

    /// Parse a root identifier, canonical or short, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        RootKey::ALL.into_iter().find(|root| {
            name.eq_ignore_ascii_case(root.canonical_name())
                || name.eq_ignore_ascii_case(root.short_name())
        })
    }
}

impl fmt::Display for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// A key location: root hive plus backslash-delimited subkey path.
///
/// An empty `subkey` addresses the root itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyPath {
    pub root: RootKey,
    pub subkey: String,
}

impl KeyPath {
    pub fn new(root: RootKey, subkey: impl Into<String>) -> Self {
        let subkey = subkey.into();
        Self {
            root,
            subkey: normalize(&subkey),
        }
    }

    /// Split a full path such as `HKLM\SOFTWARE\Vendor` into root and subkey.
    pub fn parse(full: &str) -> Result<Self, StoreError> {
        let full = full.trim();
        let (head, tail) = match full.find(['\\', '/']) {
            Some(pos) => (&full[..pos], &full[pos + 1..]),
            None => (full, ""),
        };

        let root = RootKey::parse(head).ok_or_else(|| StoreError::InvalidPath(full.to_string()))?;
        Ok(Self::new(root, tail))
    }

    /// Child path `self\name`.
    pub fn join(&self, name: &str) -> Self {
        if self.subkey.is_empty() {
            Self::new(self.root, name)
        } else {
            Self::new(self.root, format!("{}\\{}", self.subkey, name))
        }
    }

    /// Parent subkey path and leaf name, or `None` for the root itself.
    ///
    /// For a direct child of the root the parent is the empty string.
    pub fn split_leaf(&self) -> Option<(&str, &str)> {
        if self.subkey.is_empty() {
            return None;
        }
        match self.subkey.rfind('\\') {
            Some(pos) => Some((&self.subkey[..pos], &self.subkey[pos + 1..])),
            None => Some(("", self.subkey.as_str())),
        }
    }

    /// The containing key; the root itself has no parent.
    pub fn parent(&self) -> Option<KeyPath> {
        self.split_leaf().map(|(parent, _)| KeyPath::new(self.root, parent))
    }

    pub fn leaf(&self) -> &str {
        self.split_leaf().map(|(_, leaf)| leaf).unwrap_or("")
    }

    pub fn is_root_child(&self) -> bool {
        !self.subkey.is_empty() && !self.subkey.contains('\\')
    }

    /// Number of path components below the root.
    pub fn depth(&self) -> usize {
        if self.subkey.is_empty() {
            0
        } else {
            self.subkey.split('\\').count()
        }
    }

    /// Path with the short root alias, as `reg.exe` expects it.
    pub fn to_short_string(&self) -> String {
        if self.subkey.is_empty() {
            self.root.short_name().to_string()
        } else {
            format!("{}\\{}", self.root.short_name(), self.subkey)
        }
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.subkey.is_empty() {
            write!(f, "{}", self.root)
        } else {
            write!(f, "{}\\{}", self.root, self.subkey)
        }
    }
}

impl TryFrom<String> for KeyPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        KeyPath::parse(&value)
    }
}

impl From<KeyPath> for String {
    fn from(path: KeyPath) -> Self {
        path.to_string()
    }
}

/// Collapse separators: forward slashes become backslashes, empty components vanish.
pub fn normalize(subkey: &str) -> String {
    subkey
        .split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\\")
}

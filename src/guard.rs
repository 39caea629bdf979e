//! Policy for locations that must never be deleted.
//!
//! Matching is a case-insensitive prefix test on the canonical full path,
//! so a protected entry also shields every key whose path merely starts
//! with the same text.

use crate::hive::{KeyPath, RootKey};

/// Critical subtrees, as (root, subkey prefix).
const CRITICAL_KEYS: &[(RootKey, &str)] = &[
    (RootKey::LocalMachine, "SYSTEM"),
    (RootKey::LocalMachine, "SECURITY"),
    (RootKey::LocalMachine, "SAM"),
    (RootKey::LocalMachine, "HARDWARE"),
    (RootKey::LocalMachine, "BCD00000000"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows NT\\CurrentVersion"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Policies"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Shell Folders"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\User Shell Folders"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Cryptography"),
    (RootKey::LocalMachine, "SOFTWARE\\Microsoft\\Windows Defender"),
    (RootKey::LocalMachine, "SOFTWARE\\Policies"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Run"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\RunOnce"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\Shell Folders"),
    (RootKey::CurrentUser, "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Explorer\\User Shell Folders"),
    (RootKey::ClassesRoot, ".exe"),
    (RootKey::ClassesRoot, ".dll"),
    (RootKey::ClassesRoot, ".bat"),
    (RootKey::ClassesRoot, ".cmd"),
    (RootKey::ClassesRoot, ".com"),
    (RootKey::ClassesRoot, ".lnk"),
    (RootKey::ClassesRoot, ".msi"),
    (RootKey::ClassesRoot, "exefile"),
    (RootKey::ClassesRoot, "dllfile"),
    (RootKey::ClassesRoot, "batfile"),
    (RootKey::ClassesRoot, "cmdfile"),
];

/// Value names that are never removed from any key.
const PROTECTED_VALUES: &[&str] = &[
    "(Default)",
    "@",
    "Path",
    "InstallPath",
    "ProgramFilesDir",
    "CommonFilesDir",
    "SystemRoot",
    "windir",
];

/// Substrings marking a path as belonging to the operating system.
const CRITICAL_KEYWORDS: &[&str] = &[
    "microsoft",
    "windows",
    "system32",
    "syswow64",
    "winsxs",
    "trusted",
    "security",
    "policy",
    "crypto",
    "driver",
    "service",
];

/// Static policy oracle consulted by detectors and before every delete.
#[derive(Debug, Clone)]
pub struct ProtectedPathGuard {
    /// Upper-cased canonical prefixes.
    prefixes: Vec<String>,
}

impl Default for ProtectedPathGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtectedPathGuard {
    /// Guard with the built-in critical locations.
    pub fn new() -> Self {
        Self {
            prefixes: CRITICAL_KEYS
                .iter()
                .map(|(root, subkey)| KeyPath::new(*root, *subkey).to_string().to_uppercase())
                .collect(),
        }
    }

    /// Add site-specific protected locations on top of the built-ins.
    pub fn with_extra<'a>(mut self, extra: impl IntoIterator<Item = &'a KeyPath>) -> Self {
        self.prefixes
            .extend(extra.into_iter().map(|path| path.to_string().to_uppercase()));
        self
    }

    pub fn is_protected(&self, path: &KeyPath) -> bool {
        self.is_protected_str(&path.to_string())
    }

    /// Prefix test on a canonical full path string.
    pub fn is_protected_str(&self, full_path: &str) -> bool {
        let upper = full_path.to_uppercase();
        self.prefixes.iter().any(|prefix| upper.starts_with(prefix))
    }

    pub fn is_protected_value(&self, name: &str) -> bool {
        PROTECTED_VALUES.iter().any(|v| v.eq_ignore_ascii_case(name))
    }

    pub fn contains_critical_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        CRITICAL_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(full: &str) -> KeyPath {
        KeyPath::parse(full).unwrap()
    }

    #[test]
    fn system_subtrees_are_protected() {
        let guard = ProtectedPathGuard::new();
        assert!(guard.is_protected(&key(r"HKLM\SYSTEM\CurrentControlSet\Services\x")));
        assert!(guard.is_protected(&key(r"hklm\software\microsoft\windows nt\currentversion\Fonts")));
        assert!(guard.is_protected(&key(r"HKCR\.exe")));
        assert!(!guard.is_protected(&key(r"HKLM\SOFTWARE\Vendor")));
        assert!(!guard.is_protected(&key(r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\RecentDocs")));
    }

    #[test]
    fn prefix_match_is_textual() {
        let guard = ProtectedPathGuard::new();
        assert!(guard.is_protected(&key(r"HKCR\.com")));
        assert!(guard.is_protected(&key(r"HKCR\.combined")));
        assert!(guard.is_protected(&key(r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\RunOnceEx")));
    }

    #[test]
    fn extra_prefixes_extend_policy() {
        let extra = [key(r"HKCU\Software\Corp")];
        let guard = ProtectedPathGuard::new().with_extra(&extra);
        assert!(guard.is_protected(&key(r"HKCU\SOFTWARE\corp\Agent")));
    }

    #[test]
    fn value_names() {
        let guard = ProtectedPathGuard::new();
        assert!(guard.is_protected_value("WINDIR"));
        assert!(guard.is_protected_value("(Default)"));
        assert!(!guard.is_protected_value("MyTool"));
    }

    #[test]
    fn critical_keywords() {
        let guard = ProtectedPathGuard::new();
        assert!(guard.contains_critical_keyword(r"C:\Windows\System32\x.dll"));
        assert!(guard.contains_critical_keyword("SecurityHealth"));
        assert!(!guard.contains_critical_keyword(r"C:\Tools\app.exe"));
    }
}

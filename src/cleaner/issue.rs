//! Findings produced by detectors.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hive::KeyPath;

/// How serious a finding is. Critical findings are never remediated automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Critical => "Critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detector domain an issue belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    AppPaths,
    ActiveX,
    ContextMenu,
    EmptyKeys,
    FileExtension,
    Firewall,
    Fonts,
    HelpFiles,
    ImageExecution,
    MruEntry,
    Services,
    SharedDll,
    Sounds,
    Software,
    StartMenu,
    StartupEntry,
    BrowserHistory,
    UninstallEntry,
    MuiCache,
}

impl IssueCategory {
    pub fn display_name(self) -> &'static str {
        match self {
            IssueCategory::AppPaths => "Application paths",
            IssueCategory::ActiveX => "ActiveX/COM",
            IssueCategory::ContextMenu => "Context menu",
            IssueCategory::EmptyKeys => "Empty keys",
            IssueCategory::FileExtension => "File extensions",
            IssueCategory::Firewall => "Firewall rules",
            IssueCategory::Fonts => "Fonts",
            IssueCategory::HelpFiles => "Help files",
            IssueCategory::ImageExecution => "Image file execution",
            IssueCategory::MruEntry => "Recent file lists",
            IssueCategory::Services => "Services",
            IssueCategory::SharedDll => "Shared DLLs",
            IssueCategory::Sounds => "Sound events",
            IssueCategory::Software => "Software paths",
            IssueCategory::StartMenu => "Start menu",
            IssueCategory::StartupEntry => "Startup programs",
            IssueCategory::BrowserHistory => "Browser history",
            IssueCategory::UninstallEntry => "Uninstall entries",
            IssueCategory::MuiCache => "MUI cache",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One dangling, orphaned or stale reference.
///
/// Issues carry paths only, never open handles, so they can be serialized
/// into a backup and replayed later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub key: KeyPath,
    /// Target value; empty when the issue covers the whole key.
    #[serde(default)]
    pub value_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    pub category: IssueCategory,
    pub severity: Severity,
    pub is_value_issue: bool,
}

impl Issue {
    /// Whether cleaning removes a single value rather than the key.
    pub fn targets_value(&self) -> bool {
        self.is_value_issue && !self.value_name.is_empty()
    }

    /// `key` or `key [value]`, for listings and failure records.
    pub fn location(&self) -> String {
        if self.targets_value() {
            format!("{} [{}]", self.key, self.value_name)
        } else {
            self.key.to_string()
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} - {}", self.severity, self.key, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hive::RootKey;

    fn sample(value: &str, is_value: bool) -> Issue {
        Issue {
            key: KeyPath::new(RootKey::CurrentUser, r"Software\A"),
            value_name: value.to_string(),
            description: "Missing file".to_string(),
            details: String::new(),
            category: IssueCategory::Software,
            severity: Severity::Low,
            is_value_issue: is_value,
        }
    }

    #[test]
    fn severity_orders_by_seriousness() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn value_target_requires_name_and_flag() {
        assert!(sample("InstallPath", true).targets_value());
        assert!(!sample("", true).targets_value());
        assert!(!sample("InstallPath", false).targets_value());
    }

    #[test]
    fn location_and_display() {
        let issue = sample("InstallPath", true);
        assert_eq!(issue.location(), r"HKEY_CURRENT_USER\Software\A [InstallPath]");
        assert_eq!(issue.to_string(), r"[Low] HKEY_CURRENT_USER\Software\A - Missing file");
    }

    #[test]
    fn serializes_path_as_string() {
        let json = serde_json::to_value(sample("", false)).unwrap();
        assert_eq!(json["key"], r"HKEY_CURRENT_USER\Software\A");
        assert_eq!(json["category"], "software");
        assert_eq!(json["severity"], "low");
    }
}

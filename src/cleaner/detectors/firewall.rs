//! Firewall rules bound to applications.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const FIREWALL_RULES: &str =
    "SYSTEM\\CurrentControlSet\\Services\\SharedAccess\\Parameters\\FirewallPolicy\\FirewallRules";

/// Flags firewall rules whose `App=` program is gone.
pub struct FirewallDetector;

/// The `App=` field of a `|`-separated rule string.
fn rule_application(rule: &str) -> Option<&str> {
    rule.split('|')
        .find_map(|field| field.strip_prefix("App="))
        .filter(|app| !app.is_empty())
}

impl Detector for FirewallDetector {
    fn id(&self) -> &'static str {
        "firewall"
    }

    fn display_name(&self) -> &'static str {
        "Firewall rules"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Firewall
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(rules) = ctx.open(RootKey::LocalMachine, FIREWALL_RULES) else {
            return issues;
        };
        progress.report_key(RootKey::LocalMachine, FIREWALL_RULES, 0);

        for value in rules.values().unwrap_or_default() {
            let Some(rule) = value.data.as_str() else {
                continue;
            };
            let Some(app) = rule_application(rule) else {
                continue;
            };

            let target = ctx.paths.expand_env(app);
            if ctx.paths.exists(&target) {
                continue;
            }
            issues.push(self.create_issue(
                KeyPath::new(RootKey::LocalMachine, FIREWALL_RULES),
                &value.name,
                "Firewall rule for missing application".to_string(),
                format!("App: {}", target),
                Severity::Low,
                true,
            ));
        }

        issues
    }
}

//! Installation paths recorded by installed software.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const SOFTWARE: &str = "SOFTWARE";

const PATH_VALUES: [&str; 2] = ["InstallPath", "InstallLocation"];

/// Vendor and OS namespaces that are not per-product keys.
const SKIPPED_VENDORS: &[&str] = &[
    "Microsoft",
    "Windows",
    "Classes",
    "Clients",
    "Policies",
    "RegisteredApplications",
    "Wow6432Node",
];

/// Flags `SOFTWARE\<vendor>\<product>` keys whose recorded install
/// directory is gone.
///
/// A product is only reported when none of its recorded paths exists; each
/// recorded value then becomes its own issue.
pub struct SoftwarePathDetector;

fn is_skipped_vendor(name: &str) -> bool {
    SKIPPED_VENDORS.iter().any(|s| s.eq_ignore_ascii_case(name))
}

impl SoftwarePathDetector {
    fn check_product(&self, ctx: &ScanContext<'_>, root: RootKey, path: &str, issues: &mut Vec<Issue>) {
        let Some(product) = ctx.open(root, path) else {
            return;
        };

        let recorded: Vec<(&str, String)> = PATH_VALUES
            .iter()
            .filter_map(|name| {
                let data = product.value(name)?;
                let location = ctx.paths.resolve_path(data.as_str()?);
                (!location.is_empty()).then_some((*name, location))
            })
            .collect();

        if recorded.is_empty() || recorded.iter().any(|(_, location)| ctx.paths.exists(location)) {
            return;
        }

        for (name, location) in recorded {
            issues.push(self.create_issue(
                KeyPath::new(root, path),
                name,
                format!("Install path not found: {}", path),
                format!("{}: {}", name, location),
                Severity::Low,
                true,
            ));
        }
    }
}

impl Detector for SoftwarePathDetector {
    fn id(&self) -> &'static str {
        "software-paths"
    }

    fn display_name(&self) -> &'static str {
        "Software paths"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Software
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();

        for root in [RootKey::LocalMachine, RootKey::CurrentUser] {
            let Some(software) = ctx.open(root, SOFTWARE) else {
                continue;
            };

            for vendor in software.subkey_names().unwrap_or_default() {
                if is_skipped_vendor(&vendor) {
                    continue;
                }
                let vendor_path = format!("{}\\{}", SOFTWARE, vendor);
                progress.report_key(root, &vendor_path, issues.len());

                let Some(vendor_key) = ctx.open(root, &vendor_path) else {
                    continue;
                };
                for product in vendor_key.subkey_names().unwrap_or_default() {
                    let product_path = format!("{}\\{}", vendor_path, product);
                    if ctx.guard.is_protected(&KeyPath::new(root, &product_path)) {
                        continue;
                    }
                    self.check_product(ctx, root, &product_path, &mut issues);
                }
            }
        }

        issues
    }
}

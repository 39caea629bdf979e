//! Windows service binaries.

use std::path::PathBuf;

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const SERVICES: &str = "SYSTEM\\CurrentControlSet\\Services";

/// Kernel driver, file system driver and adapter types.
const DRIVER_TYPES: [u32; 3] = [1, 2, 8];

const START_DISABLED: u32 = 4;

/// Flags enabled user-mode services whose `ImagePath` binary is gone.
pub struct ServiceDetector;

impl ServiceDetector {
    fn image_path(&self, ctx: &ScanContext<'_>, raw: &str) -> Option<String> {
        let expanded = ctx.paths.expand_system_root(raw);
        let target = ctx.paths.resolve_command(&expanded)?;
        if !target.contains(':') && !target.starts_with(['\\', '/']) {
            // Relative image paths are resolved against the Windows directory.
            let joined = PathBuf::from(ctx.paths.windows_dir()).join(&target);
            return Some(joined.display().to_string());
        }
        Some(target)
    }
}

impl Detector for ServiceDetector {
    fn id(&self) -> &'static str {
        "services"
    }

    fn display_name(&self) -> &'static str {
        "Services"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::Services
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let Some(services) = ctx.open(RootKey::LocalMachine, SERVICES) else {
            return issues;
        };

        for name in services.subkey_names().unwrap_or_default() {
            let path = format!("{}\\{}", SERVICES, name);
            progress.report_key(RootKey::LocalMachine, &path, issues.len());

            let Some(service) = ctx.open(RootKey::LocalMachine, &path) else {
                continue;
            };
            let Some(kind) = service.value("Type").and_then(|d| d.as_dword()) else {
                continue;
            };
            if DRIVER_TYPES.contains(&kind) {
                continue;
            }
            let Some(raw) = service.value("ImagePath").and_then(|d| d.as_str().map(str::to_owned)) else {
                continue;
            };
            let Some(target) = self.image_path(ctx, &raw) else {
                continue;
            };
            if ctx.paths.exists(&target) {
                continue;
            }
            if service.value("Start").and_then(|d| d.as_dword()) == Some(START_DISABLED) {
                continue;
            }

            issues.push(self.create_issue(
                KeyPath::new(RootKey::LocalMachine, &path),
                "ImagePath",
                format!("Service binary not found: {}", name),
                format!("ImagePath: {}", raw),
                Severity::Medium,
                true,
            ));
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detectors::fixture::Fixture;
    use crate::hive::ValueData;

    const SVC: &str = r"HKLM\SYSTEM\CurrentControlSet\Services";

    fn service(fx: &Fixture, name: &str, kind: u32, start: u32, image: &str) {
        let key = format!(r"{}\{}", SVC, name);
        fx.put(&key, "Type", ValueData::DWord(kind));
        fx.put(&key, "Start", ValueData::DWord(start));
        fx.put(&key, "ImagePath", ValueData::ExpandString(image.to_string()));
    }

    #[test]
    fn test_missing_service_binary() {
        let fx = Fixture::new();
        let gone = fx.missing_file("svc/gone.exe");
        service(&fx, "GoneSvc", 0x10, 2, &format!("\"{}\" -k netsvcs", gone));

        let issues = fx.scan(&ServiceDetector);

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].value_name, "ImagePath");
        assert_eq!(issues[0].severity, Severity::Medium);
        assert_eq!(issues[0].key.leaf(), "GoneSvc");
    }

    #[test]
    fn test_drivers_and_disabled_services_are_excluded() {
        let fx = Fixture::new();
        service(&fx, "Driver", 1, 0, &fx.missing_file("drv.sys"));
        service(&fx, "FsDriver", 2, 0, &fx.missing_file("fs.sys"));
        service(&fx, "Disabled", 0x10, 4, &fx.missing_file("disabled.exe"));

        assert!(fx.scan(&ServiceDetector).is_empty());
    }

    #[test]
    fn test_system_root_prefix_resolves_under_windows_dir() {
        let fx = Fixture::new();
        std::fs::write(fx.windows_dir().join("System32").join("svchost.exe"), "").unwrap();
        service(&fx, "Host", 0x20, 2, r"\SystemRoot\System32\svchost.exe -k netsvcs");

        assert!(fx.scan(&ServiceDetector).is_empty());
    }

    #[test]
    fn test_relative_image_path_resolves_under_windows_dir() {
        let fx = Fixture::new();
        std::fs::write(fx.windows_dir().join("System32").join("agent.exe"), "").unwrap();
        service(&fx, "Agent", 0x10, 3, r"System32\agent.exe");

        assert!(fx.scan(&ServiceDetector).is_empty());
    }

    #[test]
    fn test_service_without_dword_type_is_ignored() {
        let fx = Fixture::new();
        let key = format!(r"{}\Odd", SVC);
        fx.put_str(&key, "Type", "16");
        fx.put_str(&key, "ImagePath", &fx.missing_file("odd.exe"));

        assert!(fx.scan(&ServiceDetector).is_empty());
    }
}

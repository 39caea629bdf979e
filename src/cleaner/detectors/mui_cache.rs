//! Shell MUI cache entries.

use crate::cleaner::{Detector, Issue, IssueCategory, ScanContext, ScanReporter, Severity};
use crate::hive::{KeyPath, RootKey};

const MUI_CACHE: &str = "SOFTWARE\\Classes\\Local Settings\\Software\\Microsoft\\Windows\\Shell\\MuiCache";

/// Reported once the number of stale entries exceeds this.
const STALE_THRESHOLD: usize = 5;

/// Flags a MUI cache dominated by entries for programs that are gone.
pub struct MuiCacheDetector;

/// Value names look like `C:\app.exe.FriendlyAppName`; keep the path part.
fn cached_path(name: &str) -> Option<&str> {
    let path = match name.rfind('.') {
        Some(pos) => &name[..pos],
        None => name,
    };
    (path.len() >= 3 && path.contains(['\\', '/'])).then_some(path)
}

impl Detector for MuiCacheDetector {
    fn id(&self) -> &'static str {
        "mui-cache"
    }

    fn display_name(&self) -> &'static str {
        "MUI cache"
    }

    fn category(&self) -> IssueCategory {
        IssueCategory::MuiCache
    }

    fn scan(&self, ctx: &ScanContext<'_>, progress: &ScanReporter<'_>) -> Vec<Issue> {
        let Some(cache) = ctx.open(RootKey::CurrentUser, MUI_CACHE) else {
            return Vec::new();
        };
        progress.report_key(RootKey::CurrentUser, MUI_CACHE, 0);

        let stale = cache
            .values()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| cached_path(&v.name))
            .filter(|path| !ctx.paths.exists(path))
            .count();

        if stale <= STALE_THRESHOLD {
            return Vec::new();
        }
        vec![self.create_issue(
            KeyPath::new(RootKey::CurrentUser, MUI_CACHE),
            "",
            format!("MUI cache has {} stale entries", stale),
            String::new(),
            Severity::Low,
            false,
        )]
    }
}

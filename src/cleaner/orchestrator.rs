//! Orchestrator for scan and clean passes.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::cleaner::backup::BackupManager;
use crate::cleaner::cancel::CancellationToken;
use crate::cleaner::executor::{CleanExecutor, CleanOptions, CleanOutcome};
use crate::cleaner::registry::DetectorRegistry;
use crate::cleaner::{Detector, Issue, ScanContext, ScanReporter};
use crate::guard::ProtectedPathGuard;
use crate::hive::{KeyStore, PathResolver};

/// Scan progress: detector name, current key, issues found so far.
pub type DetectorProgressFn<'a> = dyn Fn(&str, &str, usize) + Sync + 'a;

/// Clean progress: zero-based index, total, issue about to be processed.
pub type CleanProgressFn<'a> = dyn Fn(usize, usize, &Issue) + 'a;

/// An issue that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedItem {
    pub location: String,
    pub reason: String,
}

/// Counters for one clean call, or cumulative for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub issues_found: usize,
    pub issues_cleaned: usize,
    pub issues_failed: usize,
    pub issues_skipped: usize,
    /// Subset of `issues_cleaned` that needed force mode.
    pub forced_deletes: usize,
    /// Subset of `issues_cleaned` left for removal at next startup.
    pub scheduled_for_reboot: usize,
    pub failed_items: Vec<FailedItem>,
    pub scan_duration: Duration,
    pub clean_duration: Duration,
    pub cancelled: bool,
}

impl RunStats {
    /// Every found issue resolved to exactly one outcome.
    pub fn is_balanced(&self) -> bool {
        self.issues_found == self.issues_cleaned + self.issues_failed + self.issues_skipped
    }

    pub fn has_failures(&self) -> bool {
        self.issues_failed > 0
    }

    fn record(&mut self, issue: &Issue, outcome: &CleanOutcome) {
        match outcome {
            CleanOutcome::Cleaned => self.issues_cleaned += 1,
            CleanOutcome::Forced => {
                self.issues_cleaned += 1;
                self.forced_deletes += 1;
            }
            CleanOutcome::Scheduled => {
                self.issues_cleaned += 1;
                self.scheduled_for_reboot += 1;
            }
            CleanOutcome::Skipped(_) => self.issues_skipped += 1,
            CleanOutcome::Failed(reason) => {
                self.issues_failed += 1;
                self.failed_items.push(FailedItem {
                    location: issue.location(),
                    reason: reason.clone(),
                });
            }
        }
    }

    /// Fold a clean batch into session totals. `issues_found` belongs to
    /// the last scan and is left alone.
    fn accumulate(&mut self, batch: &RunStats) {
        self.issues_cleaned += batch.issues_cleaned;
        self.issues_failed += batch.issues_failed;
        self.issues_skipped += batch.issues_skipped;
        self.forced_deletes += batch.forced_deletes;
        self.scheduled_for_reboot += batch.scheduled_for_reboot;
        self.failed_items.extend(batch.failed_items.iter().cloned());
        self.clean_duration += batch.clean_duration;
        self.cancelled |= batch.cancelled;
    }
}

/// Runs enabled detectors over a store and cleans the issues they report.
///
/// Detectors may run in parallel; cleaning is always one issue at a time,
/// in the order given, since deleting a key invalidates issues below it.
pub struct CleanOrchestrator<'a> {
    store: &'a dyn KeyStore,
    registry: DetectorRegistry,
    paths: PathResolver,
    guard: ProtectedPathGuard,
    backups: Option<BackupManager>,
    parallel: bool,
    cancel: CancellationToken,
    session: RunStats,
}

impl<'a> CleanOrchestrator<'a> {
    /// Create an orchestrator with the built-in guard, the process
    /// environment for path expansion, and no backups.
    pub fn new(store: &'a dyn KeyStore, registry: DetectorRegistry) -> Self {
        Self {
            store,
            registry,
            paths: PathResolver::from_env(),
            guard: ProtectedPathGuard::new(),
            backups: None,
            parallel: false,
            cancel: CancellationToken::new(),
            session: RunStats::default(),
        }
    }

    pub fn with_paths(mut self, paths: PathResolver) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_guard(mut self, guard: ProtectedPathGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn with_backups(mut self, backups: BackupManager) -> Self {
        self.backups = Some(backups);
        self
    }

    /// Run detectors on the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut DetectorRegistry {
        &mut self.registry
    }

    /// A handle that cancels this orchestrator's scan or clean.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cumulative statistics for this session.
    pub fn session_stats(&self) -> &RunStats {
        &self.session
    }

    /// Run every enabled detector and concatenate their issues in
    /// registration order.
    ///
    /// The reported count is cumulative across detectors when running
    /// sequentially and per detector when running in parallel.
    pub fn scan(&mut self, progress: Option<&DetectorProgressFn<'_>>) -> Vec<Issue> {
        let start = Instant::now();
        let ctx = ScanContext::new(self.store, &self.paths, &self.guard);
        let detectors: Vec<&dyn Detector> = self.registry.enabled().collect();
        let cancel = &self.cancel;

        let issues: Vec<Issue> = if self.parallel {
            detectors
                .par_iter()
                .map(|detector| {
                    if cancel.is_cancelled() {
                        return Vec::new();
                    }
                    run_detector(*detector, &ctx, progress, 0)
                })
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut all = Vec::new();
            for detector in detectors {
                if cancel.is_cancelled() {
                    break;
                }
                let found = run_detector(detector, &ctx, progress, all.len());
                all.extend(found);
            }
            all
        };

        if self.cancel.is_cancelled() {
            tracing::info!("Scan cancelled after {} issues", issues.len());
        }

        self.session.issues_found = issues.len();
        self.session.scan_duration = start.elapsed();
        tracing::info!(
            "Scan found {} issues in {:.2?}",
            issues.len(),
            self.session.scan_duration
        );

        issues
    }

    /// Clean `issues` in order. Returns the stats for this batch and adds
    /// them to the session totals.
    pub fn clean(
        &mut self,
        issues: &[Issue],
        options: CleanOptions,
        progress: Option<&CleanProgressFn<'_>>,
    ) -> RunStats {
        let start = Instant::now();
        let total = issues.len();
        let mut stats = RunStats {
            issues_found: total,
            ..RunStats::default()
        };

        if options.create_backup && !options.dry_run && !issues.is_empty() {
            self.write_backup(issues);
        }

        let executor = CleanExecutor::new(self.store, &self.guard, options);
        for (index, issue) in issues.iter().enumerate() {
            if self.cancel.is_cancelled() {
                stats.issues_skipped += total - index;
                stats.cancelled = true;
                tracing::info!("Clean cancelled with {} issues left", total - index);
                break;
            }

            if let Some(report) = progress {
                report(index, total, issue);
            }

            let outcome = executor.execute(issue);
            tracing::debug!("{}: {}", issue.location(), outcome);
            stats.record(issue, &outcome);
        }

        stats.clean_duration = start.elapsed();
        self.session.accumulate(&stats);

        if !options.dry_run {
            self.prune_backups();
        }

        tracing::info!(
            "Cleaned {} of {} issues ({} failed, {} skipped, {} forced, {} scheduled)",
            stats.issues_cleaned,
            total,
            stats.issues_failed,
            stats.issues_skipped,
            stats.forced_deletes,
            stats.scheduled_for_reboot
        );

        stats
    }

    /// Best effort: a failed backup is logged and the clean proceeds.
    fn write_backup(&mut self, issues: &[Issue]) {
        let store = self.store;
        let Some(backups) = self.backups.as_mut() else {
            tracing::warn!("No backup location configured, cleaning without a backup");
            return;
        };

        let label = format!("Before cleaning {} issues", issues.len());
        let result = backups
            .initialize()
            .and_then(|()| backups.create_backup_with_snapshot(store, issues, &label));

        if let Err(e) = result {
            tracing::warn!("Backup failed, continuing without one: {}", e);
        }
    }

    fn prune_backups(&self) {
        let Some(backups) = &self.backups else {
            return;
        };
        match backups.cleanup_old_backups(backups.config().max_backups) {
            Ok(0) => {}
            Ok(removed) => tracing::debug!("Removed {} old backups", removed),
            Err(e) => tracing::warn!("Failed to prune old backups: {}", e),
        }
    }
}

fn run_detector(
    detector: &dyn Detector,
    ctx: &ScanContext<'_>,
    progress: Option<&DetectorProgressFn<'_>>,
    base: usize,
) -> Vec<Issue> {
    let name = detector.display_name();
    let start = Instant::now();

    let issues = match progress {
        Some(report) => {
            report(name, "", base);
            let adapter = |key: &str, found: usize| report(name, key, base + found);
            detector.scan(ctx, &ScanReporter::new(&adapter))
        }
        None => detector.scan(ctx, &ScanReporter::silent()),
    };

    tracing::info!("{}: {} issues in {:.2?}", name, issues.len(), start.elapsed());
    issues
}

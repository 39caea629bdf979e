//! Registry issue detection and cleaning.
//!
//! This module provides:
//! - Detectors for dangling, orphaned and stale registry references
//! - Backups written before a destructive run
//! - A per-issue delete pipeline with force-mode escalation
//! - Scan/clean orchestration with cumulative statistics

pub mod backup;
mod cancel;
mod detector;
pub mod detectors;
mod executor;
mod issue;
mod orchestrator;
pub mod privilege;
mod registry;

pub use backup::{BackupConfig, BackupFile, BackupManager, CapturedState, RestoreReport};
pub use cancel::CancellationToken;
pub use detector::{Detector, ScanContext, ScanProgressFn, ScanReporter};
pub use detectors::all_detectors;
pub use executor::{CleanExecutor, CleanOptions, CleanOutcome};
pub use issue::{Issue, IssueCategory, Severity};
pub use orchestrator::{CleanOrchestrator, CleanProgressFn, DetectorProgressFn, FailedItem, RunStats};
pub use privilege::{ForceAttempt, ForceDeleter};
pub use registry::{known_detector_ids, DetectorRegistry};

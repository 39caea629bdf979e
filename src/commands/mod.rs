//! Subcommand implementations and the setup they share.

pub mod backups;
pub mod clean;
pub mod detectors;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::cleaner::{known_detector_ids, BackupManager, CancellationToken, CleanOrchestrator, DetectorRegistry};
use crate::cli::TargetArgs;
use crate::config::Config;
use crate::error::SweeperError;
use crate::guard::ProtectedPathGuard;
use crate::hive::{KeyStore, MemoryStore, PathResolver};

/// Exit code when some items could not be cleaned.
pub const EXIT_PARTIAL_FAILURE: i32 = 5;

/// The store a command works on.
pub enum Target {
    /// A hive snapshot loaded from disk; written back by [`Target::persist`].
    Hive { store: MemoryStore, path: PathBuf },
    #[cfg(windows)]
    Live(crate::hive::WindowsRegistry),
}

impl Target {
    pub fn open(hive: Option<&Path>) -> Result<Self> {
        match hive {
            Some(path) => {
                let store = MemoryStore::load(path)?;
                tracing::debug!(path = %path.display(), "Loaded hive snapshot");
                Ok(Target::Hive {
                    store,
                    path: path.to_path_buf(),
                })
            }
            None => Self::live(),
        }
    }

    #[cfg(windows)]
    fn live() -> Result<Self> {
        Ok(Target::Live(crate::hive::WindowsRegistry::new()))
    }

    #[cfg(not(windows))]
    fn live() -> Result<Self> {
        Err(SweeperError::LiveRegistryUnavailable.into())
    }

    pub fn store(&self) -> &dyn KeyStore {
        match self {
            Target::Hive { store, .. } => store,
            #[cfg(windows)]
            Target::Live(registry) => registry,
        }
    }

    /// Acquire the privileges force mode needs. Only meaningful on the
    /// live registry.
    pub fn prepare_force(&self) {
        #[cfg(windows)]
        if let Target::Live(_) = self {
            let enabled = crate::hive::enable_force_privileges();
            tracing::debug!("Enabled {} privileges for force mode", enabled);
        }
    }

    /// Write a hive snapshot back to its file.
    pub fn persist(&self) -> Result<()> {
        match self {
            Target::Hive { store, path } => {
                store.save(path)?;
                tracing::info!(path = %path.display(), "Saved hive snapshot");
                Ok(())
            }
            #[cfg(windows)]
            Target::Live(_) => Ok(()),
        }
    }
}

/// Registry for the detectors selected by `--only`/`--skip` and the config.
///
/// `--only` overrides `scan.disabled_detectors`; `--skip` adds to it.
pub fn build_registry(config: &Config, target: &TargetArgs) -> Result<DetectorRegistry> {
    let known = known_detector_ids();
    let requested = target.only.iter().chain(target.skip.iter()).flatten();
    for id in requested {
        if !known.contains(&id.as_str()) {
            return Err(SweeperError::UnknownDetector(id.clone()))
                .with_context(|| format!("valid detectors: {}", known.join(", ")));
        }
    }

    let mut registry = match &target.only {
        Some(ids) => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            DetectorRegistry::with_types(&ids)
        }
        None => {
            let mut registry = DetectorRegistry::new();
            for id in &config.scan.disabled_detectors {
                registry.set_enabled(id, false)?;
            }
            registry
        }
    };

    for id in target.skip.iter().flatten() {
        if registry.get(id).is_some() {
            registry.set_enabled(id, false)?;
        }
    }

    Ok(registry)
}

/// Orchestrator wired up from the config.
pub fn build_orchestrator<'a>(
    store: &'a dyn KeyStore,
    config: &Config,
    registry: DetectorRegistry,
) -> CleanOrchestrator<'a> {
    let extra = config.guard.protected_keys();
    CleanOrchestrator::new(store, registry)
        .with_paths(PathResolver::from_env())
        .with_guard(ProtectedPathGuard::new().with_extra(&extra))
        .with_backups(BackupManager::new(config.backup.to_backup_config()))
        .with_parallel(config.scan.parallel)
}

/// Cancel `token` on Ctrl-C. Failing to install the handler only costs
/// graceful interruption.
pub fn cancel_on_interrupt(token: CancellationToken) {
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }
}

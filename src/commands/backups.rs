//! Backups command implementation.

use anyhow::{Context, Result};
use std::path::Path;

use crate::cleaner::BackupManager;
use crate::cli::{BackupsAction, BackupsArgs};
use crate::commands::Target;
use crate::config::Config;

pub fn run(args: BackupsArgs, config: &Config) -> Result<()> {
    let manager = BackupManager::new(config.backup.to_backup_config());

    match args.action {
        BackupsAction::List => list(&manager),
        BackupsAction::Restore { file, hive } => restore(&manager, &file, hive.as_deref()),
    }
}

fn list(manager: &BackupManager) -> Result<()> {
    let backups = manager.list_backups()?;
    if backups.is_empty() {
        println!("No backups in {}", manager.directory().display());
        return Ok(());
    }

    println!("  {:<20} {:>7}  {:<40} {}", "CREATED", "ISSUES", "LABEL", "FILE");
    for path in &backups {
        match manager.load_backup(path) {
            Ok(backup) => println!(
                "  {:<20} {:>7}  {:<40} {}",
                backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                backup.issues.len(),
                backup.label,
                path.display()
            ),
            Err(e) => {
                tracing::warn!("Skipping unreadable backup: {}", e);
            }
        }
    }
    Ok(())
}

fn restore(manager: &BackupManager, file: &Path, hive: Option<&Path>) -> Result<()> {
    let target = Target::open(hive)?;
    let report = manager
        .restore_backup(file, target.store())
        .with_context(|| format!("restoring {}", file.display()))?;
    target.persist()?;

    println!(
        "Restored {} item{} from {}",
        report.restored,
        if report.restored == 1 { "" } else { "s" },
        file.display()
    );
    if report.failed > 0 {
        eprintln!("  {} item{} could not be restored", report.failed, if report.failed == 1 { "" } else { "s" });
        std::process::exit(super::EXIT_PARTIAL_FAILURE);
    }
    Ok(())
}

//! Clean command implementation.

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};

use crate::cleaner::{CleanOptions, Issue, RunStats};
use crate::cli::CleanArgs;
use crate::commands::scan::{print_issues_table, scan_with_spinner};
use crate::commands::{
    build_orchestrator, build_registry, cancel_on_interrupt, Target, EXIT_PARTIAL_FAILURE,
};
use crate::config::Config;

/// Run the clean command.
pub fn run(args: CleanArgs, config: &Config, quiet: bool) -> Result<()> {
    let target = Target::open(args.target.hive.as_deref())?;
    let registry = build_registry(config, &args.target)?;
    let mut orchestrator = build_orchestrator(target.store(), config, registry);
    cancel_on_interrupt(orchestrator.cancellation_token());

    let options = CleanOptions {
        create_backup: config.clean.create_backup && !args.no_backup,
        force_delete: config.clean.force_delete || args.force_delete,
        dry_run: args.dry_run,
    };
    if options.force_delete && !options.dry_run {
        target.prepare_force();
    }

    let issues = scan_with_spinner(&mut orchestrator, quiet);
    if orchestrator.cancellation_token().is_cancelled() {
        println!("Scan cancelled.");
        return Ok(());
    }
    if issues.is_empty() {
        println!("No registry issues found.");
        return Ok(());
    }

    print_issues_table(&issues);
    println!(
        "\nTotal: {} issue{}",
        issues.len(),
        if issues.len() == 1 { "" } else { "s" }
    );

    // Confirmation
    if !args.yes && !args.dry_run {
        print!("\nProceed with cleanup? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    if args.dry_run {
        println!("\n[DRY RUN] Would clean:");
    } else {
        println!("\nCleaning...");
    }

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(issues.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    };
    let on_issue = |index: usize, _total: usize, issue: &Issue| {
        bar.set_position(index as u64);
        bar.set_message(issue.location());
    };
    let stats = orchestrator.clean(&issues, options, Some(&on_issue));
    bar.finish_and_clear();

    if !options.dry_run {
        target.persist()?;
    }

    print_results(&stats, options.dry_run);

    if stats.has_failures() {
        std::process::exit(EXIT_PARTIAL_FAILURE);
    }

    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn print_results(stats: &RunStats, dry_run: bool) {
    println!("\nResults:");
    println!(
        "  {}: {} issue{}",
        if dry_run { "Would clean" } else { "Cleaned" },
        stats.issues_cleaned,
        plural(stats.issues_cleaned)
    );
    if stats.forced_deletes > 0 {
        println!("    forced:    {}", stats.forced_deletes);
    }
    if stats.scheduled_for_reboot > 0 {
        println!("    at reboot: {}", stats.scheduled_for_reboot);
    }
    if stats.issues_failed > 0 {
        println!("  Failed:  {} issue{}", stats.issues_failed, plural(stats.issues_failed));
    }
    if stats.issues_skipped > 0 {
        println!("  Skipped: {} issue{}", stats.issues_skipped, plural(stats.issues_skipped));
    }
    if stats.cancelled {
        println!("  Cancelled before all issues were processed");
    }
    println!("  Time:    {:.2?}", stats.clean_duration);

    for item in &stats.failed_items {
        eprintln!("  Error cleaning {}: {}", item.location, item.reason);
    }
}

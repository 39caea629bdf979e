//! Scan command implementation

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;

use crate::cleaner::{CleanOrchestrator, Issue};
use crate::cli::ScanArgs;
use crate::commands::{build_orchestrator, build_registry, cancel_on_interrupt, Target};
use crate::config::Config;

#[derive(Serialize)]
struct ScanReport<'a> {
    issues_found: usize,
    scan_duration_ms: u128,
    cancelled: bool,
    issues: &'a [Issue],
}

/// Run the scan command
pub fn run(args: ScanArgs, config: &Config, quiet: bool) -> Result<()> {
    let target = Target::open(args.target.hive.as_deref())?;
    let registry = build_registry(config, &args.target)?;
    let mut orchestrator = build_orchestrator(target.store(), config, registry);
    cancel_on_interrupt(orchestrator.cancellation_token());

    let issues = scan_with_spinner(&mut orchestrator, quiet || args.json);
    let stats = orchestrator.session_stats();
    let cancelled = orchestrator.cancellation_token().is_cancelled();

    if args.json {
        let report = ScanReport {
            issues_found: issues.len(),
            scan_duration_ms: stats.scan_duration.as_millis(),
            cancelled,
            issues: &issues,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if issues.is_empty() {
        println!("No registry issues found.");
    } else {
        print_issues_table(&issues);
    }
    println!(
        "\nFound {} issue{} in {:.2?}{}",
        issues.len(),
        if issues.len() == 1 { "" } else { "s" },
        stats.scan_duration,
        if cancelled { " (cancelled)" } else { "" }
    );

    Ok(())
}

/// Run a scan, showing the current detector and key on a spinner.
pub(crate) fn scan_with_spinner(orchestrator: &mut CleanOrchestrator<'_>, hidden: bool) -> Vec<Issue> {
    let spinner = if hidden {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {prefix:.bold} [{pos} found] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    };

    let on_key = |detector: &str, key: &str, found: usize| {
        spinner.set_prefix(detector.to_string());
        spinner.set_position(found as u64);
        spinner.set_message(key.to_string());
    };
    let issues = orchestrator.scan(Some(&on_key));

    spinner.finish_and_clear();
    issues
}

pub(crate) fn print_issues_table(issues: &[Issue]) {
    println!("\n  {:<8} {:<20} {:<60} {}", "SEVERITY", "CATEGORY", "LOCATION", "DESCRIPTION");
    println!("  {}", "─".repeat(110));

    for issue in issues {
        let location = issue.location();
        let location_display = if location.chars().count() > 58 {
            let tail: String = location.chars().rev().take(55).collect::<Vec<_>>().into_iter().rev().collect();
            format!("...{}", tail)
        } else {
            location
        };

        println!(
            "  {:<8} {:<20} {:<60} {}",
            issue.severity.as_str(),
            issue.category.display_name(),
            location_display,
            issue.description,
        );
    }
}

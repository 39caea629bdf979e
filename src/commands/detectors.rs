//! Detectors command implementation.

use crate::cleaner::DetectorRegistry;
use crate::config::Config;

/// List every detector with whether the config leaves it enabled.
pub fn run(config: &Config) {
    println!("  {:<18} {:<24} {:<22} {}", "ID", "NAME", "CATEGORY", "ENABLED");
    println!("  {}", "─".repeat(72));

    for (detector, _) in DetectorRegistry::new().iter() {
        let enabled = !config
            .scan
            .disabled_detectors
            .iter()
            .any(|id| id == detector.id());
        println!(
            "  {:<18} {:<24} {:<22} {}",
            detector.id(),
            detector.display_name(),
            detector.category().display_name(),
            if enabled { "yes" } else { "no" }
        );
    }
}

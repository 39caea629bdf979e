//! Reg Sweeper - registry integrity scanning and repair
//!
//! This crate provides functionality for:
//! - Detecting dangling, orphaned and stale registry references
//! - Removing them with backups, a protected-path guard and force-mode escalation
//! - Working against the live registry on Windows or a JSON hive snapshot anywhere

pub mod cleaner;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod guard;
pub mod hive;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SweeperError};

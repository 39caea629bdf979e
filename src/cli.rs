use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Reg Sweeper - find and remove dangling registry references
#[derive(Parser, Debug)]
#[command(name = "reg-sweeper")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report registry issues without changing anything
    Scan(ScanArgs),

    /// Scan and remove registry issues
    Clean(CleanArgs),

    /// List or restore backups
    Backups(BackupsArgs),

    /// List available detectors
    Detectors,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Which store to work on and which detectors to run.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// JSON hive snapshot to work on instead of the live registry
    #[arg(long, value_name = "FILE", env = "REG_SWEEPER_HIVE")]
    pub hive: Option<PathBuf>,

    /// Only run these detectors (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS", conflicts_with = "skip")]
    pub only: Option<Vec<String>>,

    /// Skip these detectors (comma-separated)
    #[arg(long, value_delimiter = ',', value_name = "IDS")]
    pub skip: Option<Vec<String>>,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CleanArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Take ownership of refused keys and schedule leftovers for reboot
    #[arg(long)]
    pub force_delete: bool,

    /// Do not write a backup before cleaning
    #[arg(long)]
    pub no_backup: bool,

    /// Show what would be cleaned without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub action: BackupsAction,
}

#[derive(Subcommand, Debug)]
pub enum BackupsAction {
    /// List backups, oldest first
    List,

    /// Put back the keys and values captured in a backup
    Restore {
        /// Backup file to restore
        file: PathBuf,

        /// JSON hive snapshot to restore into instead of the live registry
        #[arg(long, value_name = "FILE", env = "REG_SWEEPER_HIVE")]
        hive: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        // Validates the CLI definition is correct
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_scan_command() {
        let cli = Cli::parse_from(["reg-sweeper", "scan", "--hive", "hive.json", "--json"]);
        match cli.command {
            Command::Scan(args) => {
                assert_eq!(args.target.hive, Some(PathBuf::from("hive.json")));
                assert!(args.json);
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn parse_clean_with_options() {
        let cli = Cli::parse_from([
            "reg-sweeper",
            "clean",
            "--dry-run",
            "--only",
            "startup,mru",
            "--force-delete",
            "--no-backup",
            "-y",
        ]);
        match cli.command {
            Command::Clean(args) => {
                assert!(args.dry_run);
                assert!(args.force_delete);
                assert!(args.no_backup);
                assert!(args.yes);
                assert_eq!(
                    args.target.only,
                    Some(vec!["startup".to_string(), "mru".to_string()])
                );
            }
            _ => panic!("Expected Clean command"),
        }
    }

    #[test]
    fn only_and_skip_conflict() {
        let result = Cli::try_parse_from(["reg-sweeper", "scan", "--only", "mru", "--skip", "fonts"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_backups_restore() {
        let cli = Cli::parse_from(["reg-sweeper", "backups", "restore", "b.json"]);
        match cli.command {
            Command::Backups(BackupsArgs {
                action: BackupsAction::Restore { file, .. },
            }) => assert_eq!(file, PathBuf::from("b.json")),
            _ => panic!("Expected Backups restore"),
        }
    }

    #[test]
    fn global_verbose_flag() {
        let cli = Cli::parse_from(["reg-sweeper", "-vvv", "detectors"]);
        assert_eq!(cli.verbose, 3);
    }
}

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;

use snapkeep::backup::{BackupEngine, Outcome};
use snapkeep::cli::{handle_backup_command, BackupCommands};
use snapkeep::config::{Settings, SnapKeepPaths};
use snapkeep::SnapKeepError;

#[derive(Parser)]
#[command(
    name = "snapkeep",
    author = "SnapKeep Contributors",
    version,
    about = "Versioned backups for a JSON snapshot file",
    long_about = "SnapKeep takes full, incremental and differential backups of a \
                  JSON data file, keeps a catalog of them, and can verify, \
                  restore and prune them from the command line."
)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backup directory (overrides the settings file)
    #[arg(long, global = true, env = "SNAPKEEP_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// Snapshot file to back up (overrides the settings file)
    #[arg(long, global = true, env = "SNAPKEEP_DATA_FILE")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Backup(BackupCommands),

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    snapkeep::logging::init(cli.verbose);

    let paths = SnapKeepPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;
    if let Some(dir) = cli.backup_dir {
        settings.backup_dir = Some(dir);
    }
    if let Some(file) = cli.data_file {
        settings.data_file = Some(file);
    }
    debug!(base = %paths.base_dir().display(), "resolved paths");

    match cli.command {
        Some(Commands::Backup(cmd)) => {
            let result = BackupEngine::from_settings(&paths, &settings).and_then(|mut engine| {
                handle_backup_command(&mut engine, &paths, &mut settings, cmd, cli.json)
            });
            match result {
                Ok(true) => Ok(ExitCode::SUCCESS),
                Ok(false) => Ok(ExitCode::FAILURE),
                Err(err) if cli.json => {
                    print_failure(&err)?;
                    Ok(ExitCode::FAILURE)
                }
                Err(err) => Err(err.into()),
            }
        }
        Some(Commands::Config) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
                return Ok(ExitCode::SUCCESS);
            }
            println!("SnapKeep Configuration");
            println!("======================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Backup directory: {}", settings.backup_dir(&paths).display());
            println!("Data file:        {}", settings.data_file(&paths).display());
            println!();
            println!("Settings:");
            println!("  Compress by default: {}", settings.compress);
            println!(
                "  Retention: keep {} newest, keep {} days",
                settings.retention.keep_count, settings.retention.keep_days
            );
            println!("  Lock timeout: {}s", settings.lock_timeout_secs);
            match &settings.schedule {
                Some(s) => println!(
                    "  Schedule: {} every {}h, next at {}",
                    s.backup_type,
                    s.interval_hours,
                    s.next_backup.format("%Y-%m-%d %H:%M UTC")
                ),
                None => println!("  Schedule: none"),
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("SnapKeep - versioned backups for a JSON snapshot file");
            println!();
            println!("Run 'snapkeep --help' for usage information.");
            println!("Run 'snapkeep create' to take your first backup.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_failure(err: &SnapKeepError) -> Result<()> {
    let outcome: Outcome<()> = Outcome::failed(err);
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

//! Backup CLI commands
//!
//! Implements CLI commands for backup management. Every command can print
//! either human-readable text or a structured JSON outcome.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use serde::Serialize;

use crate::backup::{
    BackupEngine, BackupKind, BackupRecord, Outcome, SummaryFormat, Verification,
};
use crate::config::{RetentionPolicy, Settings, SnapKeepPaths};
use crate::display;
use crate::error::{SnapKeepError, SnapKeepResult};

/// Backup subcommands
#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Backup strategy: full, incremental or differential
        #[arg(short, long, default_value = "full")]
        kind: BackupKind,

        /// Snapshot file to back up (defaults to the configured data file)
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Gzip-compress the artifact
        #[arg(short, long)]
        compress: bool,

        /// Store uncompressed even if compression is on in the settings
        #[arg(long, conflicts_with = "compress")]
        no_compress: bool,

        /// Free-text description stored with the backup
        #[arg(short, long)]
        description: Option<String>,
    },

    /// List all available backups
    List {
        /// Show at most this many backups
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show information about a specific backup
    Info {
        /// Backup id (use 'latest' for most recent)
        backup: String,
    },

    /// Check that backups are readable and intact
    Verify {
        /// Backup id (use 'latest' for most recent)
        #[arg(required_unless_present = "all")]
        backup: Option<String>,

        /// Verify every backup in the index
        #[arg(long, conflicts_with = "backup")]
        all: bool,
    },

    /// Restore from a backup
    Restore {
        /// Backup id (use 'latest' for most recent)
        backup: String,

        /// Restore to this path instead of the original location
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Do not keep a copy of the file being overwritten
        #[arg(long)]
        no_safety_copy: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Delete old backups according to retention policy
    Prune {
        /// Always keep this many of the newest backups
        #[arg(long)]
        keep_count: Option<usize>,

        /// Always keep backups younger than this many days
        #[arg(long)]
        keep_days: Option<u32>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show backup statistics
    Stats,

    /// Export a summary of all backups
    Summary {
        /// Output format: json or yaml
        #[arg(short, long, default_value = "json")]
        format: SummaryFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Describe a recurring backup schedule
    Schedule {
        /// Hours between backups
        #[arg(long, default_value_t = 24)]
        interval_hours: u32,

        /// Backup strategy to run
        #[arg(short, long, default_value = "incremental")]
        kind: BackupKind,

        /// Compress scheduled backups
        #[arg(short, long)]
        compress: bool,

        /// Store the schedule in the settings file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Serialize)]
struct BackupList {
    backups: Vec<BackupRecord>,
}

#[derive(Serialize)]
struct VerifyAll {
    results: Vec<Verification>,
}

#[derive(Serialize)]
struct RestorePreview {
    dry_run: bool,
    backup_id: String,
    created_at: DateTime<Utc>,
    restore_to: PathBuf,
}

/// The prune invocation that applies exactly the previewed policy
fn prune_command(keep_count: Option<usize>, keep_days: Option<u32>) -> String {
    let mut command = String::from("snapkeep prune");
    if let Some(count) = keep_count {
        command.push_str(&format!(" --keep-count {}", count));
    }
    if let Some(days) = keep_days {
        command.push_str(&format!(" --keep-days {}", days));
    }
    command.push_str(" --force");
    command
}

/// Print an outcome either as JSON or through `text`
fn emit<T: Serialize>(json: bool, outcome: &Outcome<T>, text: impl FnOnce(&T) -> String) -> SnapKeepResult<()> {
    if json {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        serde_json::to_writer_pretty(&mut out, outcome)?;
        writeln!(out)?;
    } else if let Some(data) = &outcome.data {
        println!("{}", text(data));
    }
    Ok(())
}

/// Handle a backup command
///
/// Returns whether the command succeeded; a failed verification is a
/// completed command with a negative result, not an error.
pub fn handle_backup_command(
    engine: &mut BackupEngine,
    paths: &SnapKeepPaths,
    settings: &mut Settings,
    cmd: BackupCommands,
    json: bool,
) -> SnapKeepResult<bool> {
    match cmd {
        BackupCommands::Create {
            kind,
            source,
            compress,
            no_compress,
            description,
        } => {
            let compress = compress || (settings.compress && !no_compress);
            let source = source.as_deref();
            let description = description.as_deref();

            match kind {
                BackupKind::Incremental => {
                    let report = engine.create_incremental(source, compress, description)?;
                    emit(json, &Outcome::ok(report), |r| match &r.backup {
                        Some(b) => format!("Backup created: {}\nLocation: {}", b.backup_id, b.artifact_path.display()),
                        None => format!(
                            "Backup skipped: {}",
                            r.reason.as_deref().unwrap_or("no changes")
                        ),
                    })?;
                }
                BackupKind::Full | BackupKind::Differential => {
                    let report = if kind == BackupKind::Full {
                        engine.create_full(source, compress, description)?
                    } else {
                        engine.create_differential(source, compress, description)?
                    };
                    emit(json, &Outcome::ok(report), |r| {
                        let mut text = format!(
                            "Backup created: {} ({})\nLocation: {}\nSize: {}",
                            r.backup_id,
                            r.kind,
                            r.artifact_path.display(),
                            display::format_size(r.stored_size)
                        );
                        if let Some(based_on) = &r.based_on {
                            text.push_str(&format!("\nBased on: {}", based_on));
                        }
                        text
                    })?;
                }
            }
        }

        BackupCommands::List { limit } => {
            let records = engine.list_backups(limit);
            if json {
                let list = BackupList {
                    backups: records.into_iter().cloned().collect(),
                };
                emit(json, &Outcome::ok(list), |_| String::new())?;
            } else {
                println!("{}", display::format_backup_list(&records, Utc::now()));
            }
        }

        BackupCommands::Info { backup } => {
            let record = engine.get_backup_info(&backup)?.clone();
            emit(json, &Outcome::ok(record), display::format_backup_details)?;
        }

        BackupCommands::Verify { backup, all } => {
            let ids: Vec<String> = if all {
                engine
                    .list_backups(None)
                    .into_iter()
                    .map(|r| r.backup_id.clone())
                    .collect()
            } else {
                backup.into_iter().collect()
            };

            let results: Vec<Verification> = ids.iter().map(|id| engine.verify_backup(id)).collect();
            let all_valid = results.iter().all(|r| r.valid);

            emit(json, &Outcome::with_flag(all_valid, VerifyAll { results }), |v| {
                if v.results.is_empty() {
                    return "No backups to verify.".to_string();
                }
                v.results
                    .iter()
                    .map(display::format_verification)
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
            return Ok(all_valid);
        }

        BackupCommands::Restore {
            backup,
            dest,
            no_safety_copy,
            force,
        } => {
            if !force {
                let record = engine.get_backup_info(&backup)?;
                let preview = RestorePreview {
                    dry_run: true,
                    backup_id: record.backup_id.clone(),
                    created_at: record.created_at,
                    restore_to: dest.clone().unwrap_or_else(|| record.source_path.clone()),
                };
                emit(json, &Outcome::ok(preview), |p| {
                    format!(
                        "Backup {} from {}\nWould restore to: {}\n\n\
                         WARNING: This will overwrite the destination file!\n\
                         To proceed, run again with --force flag:\n  snapkeep restore {} --force",
                        p.backup_id,
                        p.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        p.restore_to.display(),
                        backup
                    )
                })?;
                return Ok(true);
            }

            let report = engine.restore_backup(&backup, dest.as_deref(), !no_safety_copy)?;
            emit(json, &Outcome::ok(report), |r| {
                let mut text = format!(
                    "Restored {} (taken {}) to {}",
                    r.backup_id,
                    r.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    r.restored_to.display()
                );
                if let Some(copy) = &r.safety_copy {
                    text.push_str(&format!("\nPrevious content saved to {}", copy.display()));
                }
                text
            })?;
        }

        BackupCommands::Prune {
            keep_count,
            keep_days,
            force,
        } => {
            let policy = RetentionPolicy {
                keep_count: keep_count.unwrap_or(settings.retention.keep_count),
                keep_days: keep_days.unwrap_or(settings.retention.keep_days),
            };

            if !force {
                let plan = engine.preview_retention(&policy);
                if json {
                    #[derive(Serialize)]
                    struct PrunePreview {
                        dry_run: bool,
                        remove: Vec<String>,
                        keep: Vec<String>,
                    }
                    let preview = PrunePreview {
                        dry_run: true,
                        remove: plan.remove,
                        keep: plan.keep,
                    };
                    emit(json, &Outcome::ok(preview), |_| String::new())?;
                } else {
                    println!(
                        "Retention policy: keep {} newest, keep {} days",
                        policy.keep_count, policy.keep_days
                    );
                    println!("{}", display::format_retention_plan(&plan));
                    if !plan.remove.is_empty() {
                        println!("To delete old backups, run again with --force flag:");
                        println!("  {}", prune_command(keep_count, keep_days));
                    }
                }
                return Ok(true);
            }

            let report = engine.apply_retention(&policy)?;
            emit(json, &Outcome::ok(report), display::format_cleanup)?;
        }

        BackupCommands::Stats => {
            let stats = engine.get_backup_statistics();
            emit(json, &Outcome::ok(stats), display::format_statistics)?;
        }

        BackupCommands::Summary { format, output } => match output {
            Some(path) => {
                let file = File::create(&path).map_err(|e| {
                    SnapKeepError::Io(format!("Failed to create {}: {}", path.display(), e))
                })?;
                let mut writer = BufWriter::new(file);
                engine.write_summary(format, &mut writer)?;
                writer.flush()?;
                if !json {
                    println!("Summary written to {}", path.display());
                }
            }
            None => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                engine.write_summary(format, &mut out)?;
            }
        },

        BackupCommands::Schedule {
            interval_hours,
            kind,
            compress,
            save,
        } => {
            let schedule = engine.schedule_backup(interval_hours, kind, compress)?;
            if save {
                settings.schedule = Some(schedule.clone());
                settings.save(paths)?;
            }
            emit(json, &Outcome::ok(schedule), |s| {
                let mut text = format!(
                    "Backup scheduled every {} hours ({}{})\nNext backup: {}",
                    s.interval_hours,
                    s.backup_type,
                    if s.compress { ", compressed" } else { "" },
                    s.next_backup.format("%Y-%m-%d %H:%M:%S UTC")
                );
                if save {
                    text.push_str("\nSchedule saved to settings.");
                }
                text
            })?;
        }
    }

    Ok(true)
}

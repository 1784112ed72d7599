//! Backup display formatting
//!
//! Formats backup records, statistics and operation results for terminal
//! output.

use chrono::{DateTime, Utc};

use crate::backup::{BackupRecord, BackupStatistics, CleanupReport, RetentionPlan, Verification};

/// Format a list of backups as a table, newest first
pub fn format_backup_list(records: &[&BackupRecord], now: DateTime<Utc>) -> String {
    if records.is_empty() {
        return "No backups found.".to_string();
    }

    let id_width = records
        .iter()
        .map(|r| r.backup_id.len())
        .max()
        .unwrap_or(2)
        .max(2);

    let mut output = String::new();
    output.push_str(&format!(
        "{:<id_width$}  {:<17}  {:>10}  {:>6}  {}\n",
        "ID",
        "Type",
        "Size",
        "Age",
        "Description",
        id_width = id_width,
    ));
    output.push_str(&format!(
        "{:-<id_width$}  {:-<17}  {:->10}  {:->6}  {:-<11}\n",
        "",
        "",
        "",
        "",
        "",
        id_width = id_width,
    ));

    for record in records {
        let kind = if record.compressed {
            format!("{} (gz)", record.kind)
        } else {
            record.kind.to_string()
        };
        output.push_str(&format!(
            "{:<id_width$}  {:<17}  {:>10}  {:>6}  {}\n",
            record.backup_id,
            kind,
            format_size(record.stored_size),
            format_duration(record.age(now)),
            record.description.as_deref().unwrap_or(""),
            id_width = id_width,
        ));
    }

    output.push_str(&format!("\nTotal: {} backup(s)", records.len()));
    output
}

/// Format the full details of one backup
pub fn format_backup_details(record: &BackupRecord) -> String {
    let mut output = String::new();
    output.push_str("Backup Details\n");
    output.push_str("==============\n");
    output.push_str(&format!("ID:          {}\n", record.backup_id));
    output.push_str(&format!("Type:        {}\n", record.kind));
    output.push_str(&format!(
        "Created:     {}\n",
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(description) = &record.description {
        output.push_str(&format!("Description: {}\n", description));
    }
    output.push_str(&format!("Source:      {}\n", record.source_path.display()));
    output.push_str(&format!("Artifact:    {}\n", record.artifact_name));
    output.push_str(&format!("Hash:        {}\n", record.content_hash));
    output.push_str(&format!("Original:    {}\n", format_size(record.original_size)));
    output.push_str(&format!("Stored:      {}\n", format_size(record.stored_size)));
    if let Some(ratio) = record.compression_ratio {
        output.push_str(&format!("Saved:       {:.1}%\n", ratio * 100.0));
    }
    if let Some(based_on) = &record.based_on {
        output.push_str(&format!("Based on:    {}\n", based_on));
    }
    output
}

/// Format a verification result
pub fn format_verification(result: &Verification) -> String {
    if result.valid {
        format!("OK    {}: {}", result.backup_id, result.message)
    } else {
        let reason = result
            .reason
            .map(|r| format!("{:?}", r))
            .unwrap_or_else(|| "Unknown".to_string());
        format!("FAIL  {} [{}]: {}", result.backup_id, reason, result.message)
    }
}

/// Format backup statistics
pub fn format_statistics(stats: &BackupStatistics) -> String {
    let mut output = String::new();
    output.push_str("Backup Statistics\n");
    output.push_str("=================\n");
    output.push_str(&format!("Total backups:  {}\n", stats.total_backups));
    output.push_str(&format!(
        "Total storage:  {} ({:.2} MB)\n",
        format_size(stats.total_storage),
        stats.total_storage_mb
    ));
    output.push_str(&format!(
        "Average size:   {}\n",
        format_size(stats.average_backup_size.round() as u64)
    ));

    for (kind, count) in &stats.by_type {
        output.push_str(&format!("  {:<14}{}\n", format!("{}:", kind), count));
    }

    let when = |ts: Option<DateTime<Utc>>| {
        ts.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    output.push_str(&format!("Oldest backup:  {}\n", when(stats.oldest_backup)));
    output.push_str(&format!("Newest backup:  {}\n", when(stats.newest_backup)));
    output
}

/// Format a retention preview
pub fn format_retention_plan(plan: &RetentionPlan) -> String {
    if plan.remove.is_empty() {
        return format!("No backups to prune ({} kept).", plan.keep.len());
    }

    let mut output = format!(
        "{} backup(s) would be removed, {} kept:\n",
        plan.remove.len(),
        plan.keep.len()
    );
    for id in &plan.remove {
        output.push_str(&format!("  - {}\n", id));
    }
    output
}

/// Format a cleanup result
pub fn format_cleanup(report: &CleanupReport) -> String {
    let mut output = format!(
        "Removed {} backup(s), {} remaining.",
        report.removed.len(),
        report.kept
    );
    for warning in &report.warnings {
        output.push_str(&format!("\nWarning: {}", warning));
    }
    output
}

/// Format a duration in human-readable form
pub fn format_duration(duration: chrono::Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);

    if total_seconds < 60 {
        return format!("{}s", total_seconds);
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    format!("{}mo", days / 30)
}

/// Format a file size in human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

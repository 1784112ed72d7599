//! Statistics and summary export
//!
//! Read-only aggregation over the backup index.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::engine::BackupEngine;
use super::record::BackupKind;
use crate::error::{SnapKeepError, SnapKeepResult};

const MIB: f64 = 1024.0 * 1024.0;

/// Aggregate numbers over all backups
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackupStatistics {
    pub total_backups: usize,
    /// Sum of stored artifact sizes in bytes
    pub total_storage: u64,
    pub total_storage_mb: f64,
    pub average_backup_size: f64,
    pub by_type: BTreeMap<BackupKind, usize>,
    pub oldest_backup: Option<DateTime<Utc>>,
    pub newest_backup: Option<DateTime<Utc>>,
}

/// One line of the exported summary
#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub backup_id: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub file: String,
    pub size: u64,
    pub compressed: bool,
}

/// Exportable overview of the whole backup directory
#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub export_date: DateTime<Utc>,
    pub backup_directory: PathBuf,
    pub total_backups: usize,
    /// Newest first
    pub backups: Vec<SummaryEntry>,
    pub statistics: BackupStatistics,
}

/// Output format for [`BackupEngine::write_summary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for SummaryFormat {
    type Err = SnapKeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(SnapKeepError::Validation(format!(
                "Unknown summary format '{}' (expected json or yaml)",
                other
            ))),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl BackupEngine {
    /// Compute statistics over the index
    pub fn get_backup_statistics(&self) -> BackupStatistics {
        let records = self.index.records();
        if records.is_empty() {
            return BackupStatistics::default();
        }

        let total_storage: u64 = records.iter().map(|r| r.stored_size).sum();
        let mut by_type = BTreeMap::new();
        for record in records {
            *by_type.entry(record.kind).or_insert(0) += 1;
        }

        BackupStatistics {
            total_backups: records.len(),
            total_storage,
            total_storage_mb: round2(total_storage as f64 / MIB),
            average_backup_size: round2(total_storage as f64 / records.len() as f64),
            by_type,
            oldest_backup: records.iter().map(|r| r.created_at).min(),
            newest_backup: records.iter().map(|r| r.created_at).max(),
        }
    }

    /// Build a summary of every backup plus the statistics
    pub fn export_backup_summary(&self) -> BackupSummary {
        let backup_directory = std::fs::canonicalize(&self.backup_dir)
            .unwrap_or_else(|_| self.backup_dir.clone());

        let backups = self
            .index
            .list(None)
            .into_iter()
            .map(|r| SummaryEntry {
                backup_id: r.backup_id.clone(),
                kind: r.kind,
                timestamp: r.created_at,
                description: r.description.clone().unwrap_or_default(),
                file: r.artifact_name.clone(),
                size: r.stored_size,
                compressed: r.compressed,
            })
            .collect::<Vec<_>>();

        BackupSummary {
            export_date: Utc::now(),
            backup_directory,
            total_backups: backups.len(),
            backups,
            statistics: self.get_backup_statistics(),
        }
    }

    /// Serialize the summary to `writer`
    pub fn write_summary<W: Write>(&self, format: SummaryFormat, writer: &mut W) -> SnapKeepResult<()> {
        let summary = self.export_backup_summary();
        match format {
            SummaryFormat::Json => {
                serde_json::to_writer_pretty(&mut *writer, &summary)?;
                writeln!(writer)?;
            }
            SummaryFormat::Yaml => {
                serde_yaml::to_writer(&mut *writer, &summary)
                    .map_err(|e| SnapKeepError::Io(format!("Failed to write YAML summary: {}", e)))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (BackupEngine, PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let data_file = temp_dir.path().join("data.json");
        fs::write(&data_file, r#"{"a":1}"#).unwrap();
        let engine = BackupEngine::open(temp_dir.path().join("backups"), &data_file).unwrap();
        (engine, data_file, temp_dir)
    }

    #[test]
    fn test_empty_statistics() {
        let (engine, _data_file, _temp) = setup();
        let stats = engine.get_backup_statistics();

        assert_eq!(stats.total_backups, 0);
        assert_eq!(stats.total_storage, 0);
        assert!(stats.by_type.is_empty());
        assert!(stats.oldest_backup.is_none());
    }

    #[test]
    fn test_statistics_by_type() {
        let (mut engine, data_file, _temp) = setup();
        let first = engine.create_full(None, false, None).unwrap();
        fs::write(&data_file, r#"{"a":22}"#).unwrap();
        engine.create_incremental(None, false, None).unwrap();
        let last = engine.create_differential(None, false, None).unwrap();

        let stats = engine.get_backup_statistics();
        assert_eq!(stats.total_backups, 3);
        assert_eq!(stats.total_storage, 7 + 8 + 8);
        assert_eq!(stats.average_backup_size, round2(23.0 / 3.0));
        assert_eq!(stats.by_type.get(&BackupKind::Full), Some(&1));
        assert_eq!(stats.by_type.get(&BackupKind::Incremental), Some(&1));
        assert_eq!(stats.by_type.get(&BackupKind::Differential), Some(&1));

        let oldest = engine.get_backup_info(&first.backup_id).unwrap().created_at;
        let newest = engine.get_backup_info(&last.backup_id).unwrap().created_at;
        assert_eq!(stats.oldest_backup, Some(oldest));
        assert_eq!(stats.newest_backup, Some(newest));
    }

    #[test]
    fn test_summary_json() {
        let (mut engine, _data_file, _temp) = setup();
        engine.create_full(None, true, Some("weekly")).unwrap();

        let mut out = Vec::new();
        engine.write_summary(SummaryFormat::Json, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(value["total_backups"], 1);
        assert_eq!(value["backups"][0]["type"], "full");
        assert_eq!(value["backups"][0]["description"], "weekly");
        assert_eq!(value["backups"][0]["compressed"], true);
        assert_eq!(value["statistics"]["by_type"]["full"], 1);
        assert!(value["backup_directory"].as_str().unwrap().ends_with("backups"));
    }

    #[test]
    fn test_summary_yaml() {
        let (mut engine, _data_file, _temp) = setup();
        engine.create_full(None, false, None).unwrap();

        let mut out = Vec::new();
        engine.write_summary(SummaryFormat::Yaml, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("total_backups: 1"));
        assert!(text.contains("type: full"));
    }

    #[test]
    fn test_summary_format_parse() {
        assert_eq!("YAML".parse::<SummaryFormat>().unwrap(), SummaryFormat::Yaml);
        assert_eq!("json".parse::<SummaryFormat>().unwrap(), SummaryFormat::Json);
        assert!("xml".parse::<SummaryFormat>().is_err());
    }
}

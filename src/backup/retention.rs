//! Retention cleanup
//!
//! A backup survives if it is among the `keep_count` most recent OR was
//! taken within the last `keep_days` days. Only backups failing both
//! conditions are removed.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::engine::BackupEngine;
use super::record::BackupRecord;
use crate::config::RetentionPolicy;
use crate::error::SnapKeepResult;

/// Which backups a policy keeps and which it removes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPlan {
    /// Ids to keep, newest first
    pub keep: Vec<String>,
    /// Ids to remove, newest first
    pub remove: Vec<String>,
}

/// Result of a cleanup run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    /// Ids dropped from the index
    pub removed: Vec<String>,
    /// Number of backups left in the index
    pub kept: usize,
    /// Problems that did not stop the cleanup
    pub warnings: Vec<String>,
}

impl CleanupReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Decide which records `policy` keeps as of `now`
pub fn plan_retention(records: &[BackupRecord], policy: &RetentionPolicy, now: DateTime<Utc>) -> RetentionPlan {
    // A window reaching past the earliest representable time keeps everything
    let cutoff = now
        .checked_sub_signed(Duration::days(i64::from(policy.keep_days)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    let mut sorted: Vec<&BackupRecord> = records.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let mut plan = RetentionPlan::default();
    for (rank, record) in sorted.into_iter().enumerate() {
        if rank < policy.keep_count || record.created_at >= cutoff {
            plan.keep.push(record.backup_id.clone());
        } else {
            plan.remove.push(record.backup_id.clone());
        }
    }
    plan
}

impl BackupEngine {
    /// Remove backups outside the retention window
    pub fn cleanup_old_backups(&mut self, keep_count: usize, keep_days: u32) -> SnapKeepResult<CleanupReport> {
        self.apply_retention(&RetentionPolicy {
            keep_count,
            keep_days,
        })
    }

    /// Remove backups outside `policy`
    pub fn apply_retention(&mut self, policy: &RetentionPolicy) -> SnapKeepResult<CleanupReport> {
        self.cleanup_at(policy, Utc::now())
    }

    /// Preview what `policy` would remove without touching anything
    pub fn preview_retention(&self, policy: &RetentionPolicy) -> RetentionPlan {
        plan_retention(self.index.records(), policy, Utc::now())
    }

    pub(crate) fn cleanup_at(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> SnapKeepResult<CleanupReport> {
        let _lock = self.lock()?;
        self.index.refresh()?;

        let plan = plan_retention(self.index.records(), policy, now);
        let mut report = CleanupReport::default();
        let mut dropped = HashSet::new();

        for backup_id in &plan.remove {
            let Some(record) = self.index.find(backup_id) else {
                continue;
            };
            let path = record.artifact_path(&self.backup_dir);

            match fs::remove_file(&path) {
                Ok(()) => {
                    dropped.insert(backup_id.clone());
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(backup_id = %backup_id, path = %path.display(), "artifact already gone");
                    report
                        .warnings
                        .push(format!("{}: artifact already missing ({})", backup_id, path.display()));
                    dropped.insert(backup_id.clone());
                }
                Err(e) => {
                    // Keep the record so the file is not orphaned
                    warn!(backup_id = %backup_id, path = %path.display(), error = %e, "could not remove artifact");
                    report
                        .warnings
                        .push(format!("{}: could not remove {}: {}", backup_id, path.display(), e));
                }
            }
        }

        for backup_id in &plan.remove {
            if dropped.contains(backup_id) && self.index.remove(backup_id).is_some() {
                report.removed.push(backup_id.clone());
            }
        }

        if !report.removed.is_empty() {
            self.index.persist()?;
        }
        report.kept = self.index.len();

        info!(
            removed = report.removed.len(),
            kept = report.kept,
            warnings = report.warnings.len(),
            "retention cleanup finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::record::BackupKind;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        "2025-10-31T12:00:00Z".parse().unwrap()
    }

    fn record(id: &str, days_old: i64) -> BackupRecord {
        BackupRecord {
            backup_id: id.to_string(),
            kind: BackupKind::Full,
            created_at: now() - Duration::days(days_old),
            description: None,
            source_path: PathBuf::from("data.json"),
            content_hash: String::new(),
            original_size: 2,
            stored_size: 2,
            compressed: false,
            compression_ratio: None,
            artifact_name: format!("{}.json", id),
            based_on: None,
        }
    }

    /// Engine whose index holds `records`, each with an artifact on disk
    fn seeded_engine(dir: &Path, records: Vec<BackupRecord>) -> BackupEngine {
        let mut engine = BackupEngine::open(dir.join("backups"), dir.join("data.json")).unwrap();
        for record in records {
            fs::write(record.artifact_path(engine.backup_dir()), "{}").unwrap();
            engine.index.append(record).unwrap();
        }
        engine.index.persist().unwrap();
        engine
    }

    #[test]
    fn test_plan_keeps_union_of_count_and_age() {
        let records = vec![
            record("d1", 1),
            record("d10", 10),
            record("d40", 40),
            record("d50", 50),
            record("d60", 60),
        ];
        let policy = RetentionPolicy {
            keep_count: 2,
            keep_days: 30,
        };

        let plan = plan_retention(&records, &policy, now());
        assert_eq!(plan.keep, vec!["d1", "d10"]);
        assert_eq!(plan.remove, vec!["d40", "d50", "d60"]);
    }

    #[test]
    fn test_plan_count_protects_old_backups() {
        let records = vec![record("d40", 40), record("d50", 50), record("d60", 60)];
        let policy = RetentionPolicy {
            keep_count: 2,
            keep_days: 7,
        };

        let plan = plan_retention(&records, &policy, now());
        assert_eq!(plan.keep, vec!["d40", "d50"]);
        assert_eq!(plan.remove, vec!["d60"]);
    }

    #[test]
    fn test_plan_age_protects_beyond_count() {
        let records: Vec<_> = (0..5).map(|d| record(&format!("d{}", d), d)).collect();
        let policy = RetentionPolicy {
            keep_count: 1,
            keep_days: 30,
        };

        let plan = plan_retention(&records, &policy, now());
        assert_eq!(plan.keep.len(), 5);
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn test_plan_unbounded_age_keeps_everything() {
        let records = vec![record("d1", 1), record("d4000", 4000)];
        let policy = RetentionPolicy {
            keep_count: 0,
            keep_days: u32::MAX,
        };

        let plan = plan_retention(&records, &policy, now());
        assert_eq!(plan.keep, vec!["d1", "d4000"]);
        assert!(plan.remove.is_empty());
    }

    #[test]
    fn test_cleanup_with_max_keep_days() {
        let temp = TempDir::new().unwrap();
        let mut engine = seeded_engine(temp.path(), vec![record("a", 0), record("b", 400)]);

        let report = engine.cleanup_old_backups(1, u32::MAX).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, 2);
    }

    #[test]
    fn test_cleanup_scenario() {
        let temp = TempDir::new().unwrap();
        let mut engine = seeded_engine(
            temp.path(),
            vec![
                record("d1", 1),
                record("d10", 10),
                record("d40", 40),
                record("d50", 50),
                record("d60", 60),
            ],
        );
        let policy = RetentionPolicy {
            keep_count: 2,
            keep_days: 30,
        };

        let report = engine.cleanup_at(&policy, now()).unwrap();

        assert_eq!(report.removed, vec!["d40", "d50", "d60"]);
        assert_eq!(report.kept, 2);
        assert!(report.warnings.is_empty());
        assert!(!engine.backup_dir().join("d40.json").exists());
        assert!(engine.backup_dir().join("d10.json").exists());
        assert_eq!(engine.get_backup_statistics().total_backups, 2);

        let reopened = BackupEngine::open(engine.backup_dir(), temp.path().join("data.json")).unwrap();
        assert_eq!(reopened.index().len(), 2);
    }

    #[test]
    fn test_cleanup_tolerates_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let mut engine = seeded_engine(temp.path(), vec![record("new", 0), record("gone", 90)]);
        fs::remove_file(engine.backup_dir().join("gone.json")).unwrap();

        let policy = RetentionPolicy {
            keep_count: 1,
            keep_days: 30,
        };
        let report = engine.cleanup_at(&policy, now()).unwrap();

        assert_eq!(report.removed, vec!["gone"]);
        assert_eq!(report.warnings.len(), 1);
        assert!(engine.index().find("gone").is_none());
    }

    #[test]
    fn test_cleanup_nothing_to_do() {
        let temp = TempDir::new().unwrap();
        let mut engine = seeded_engine(temp.path(), vec![record("a", 0), record("b", 1)]);

        let report = engine.cleanup_old_backups(10, 30).unwrap();
        assert!(report.removed.is_empty());
        assert_eq!(report.kept, 2);
    }

    #[test]
    fn test_cleanup_empty_index() {
        let temp = TempDir::new().unwrap();
        let mut engine = seeded_engine(temp.path(), Vec::new());

        let report = engine.cleanup_old_backups(0, 0).unwrap();
        assert_eq!(report.removed_count(), 0);
        assert_eq!(report.kept, 0);
    }
}

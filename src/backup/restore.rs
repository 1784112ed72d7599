//! Backup restoration for SnapKeep
//!
//! Handles restoring a snapshot file from a stored backup. The artifact is
//! fully decoded and checked before the destination is touched, so a
//! failed restore leaves the destination exactly as it was.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::engine::BackupEngine;
use crate::error::{SnapKeepError, SnapKeepResult};
use crate::storage::{temp_sibling, write_bytes_atomic};

/// Result of a restore operation
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub backup_id: String,
    /// File that now holds the restored content
    pub restored_to: PathBuf,
    /// When the restored backup was originally taken
    pub created_at: DateTime<Utc>,
    /// Copy of the previous destination content, if one was made
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_copy: Option<PathBuf>,
}

impl BackupEngine {
    /// Restore a backup to `dest` (defaults to the backup's original source)
    ///
    /// With `make_safety_copy`, an existing destination is first copied to
    /// `<dest>.pre_restore_<YYYYMMDD_HHMMSS>.bak`, stamped in UTC like
    /// backup ids.
    pub fn restore_backup(
        &self,
        backup_id: &str,
        dest: Option<&Path>,
        make_safety_copy: bool,
    ) -> SnapKeepResult<RestoreReport> {
        let (record, bytes) = self.load_artifact(backup_id)?;

        let dest = dest
            .map(Path::to_path_buf)
            .unwrap_or_else(|| record.source_path.clone());

        let safety_copy = if make_safety_copy && dest.is_file() {
            Some(write_safety_copy(&dest, Utc::now())?)
        } else {
            None
        };

        write_bytes_atomic(&dest, &bytes)?;

        info!(
            backup_id = %record.backup_id,
            dest = %dest.display(),
            bytes = bytes.len(),
            "backup restored"
        );

        Ok(RestoreReport {
            backup_id: record.backup_id.clone(),
            restored_to: dest,
            created_at: record.created_at,
            safety_copy,
        })
    }
}

/// Copy `dest` aside before it gets overwritten
fn write_safety_copy(dest: &Path, at: DateTime<Utc>) -> SnapKeepResult<PathBuf> {
    let stamp = at.format("%Y%m%d_%H%M%S");
    let mut target = temp_sibling(dest, &format!("pre_restore_{}.bak", stamp));
    let mut n = 1;
    while target.exists() {
        target = temp_sibling(dest, &format!("pre_restore_{}_{}.bak", stamp, n));
        n += 1;
    }

    fs::copy(dest, &target).map_err(|e| {
        SnapKeepError::Io(format!(
            "Failed to create safety copy of {}: {}",
            dest.display(),
            e
        ))
    })?;
    info!(safety_copy = %target.display(), "saved pre-restore copy");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    const ORIGINAL: &str = r#"{"contributors":[{"name":"ada","prs":3}]}"#;

    fn setup() -> (BackupEngine, PathBuf, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let data_file = temp_dir.path().join("data.json");
        fs::write(&data_file, ORIGINAL).unwrap();
        let engine = BackupEngine::open(temp_dir.path().join("backups"), &data_file).unwrap();
        (engine, data_file, temp_dir)
    }

    fn safety_copies(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.to_string_lossy().contains(".pre_restore_"))
            .collect()
    }

    #[test]
    fn test_restore_to_original_location() {
        let (mut engine, data_file, temp) = setup();
        let report = engine.create_full(None, true, None).unwrap();
        fs::write(&data_file, r#"{"contributors":[]}"#).unwrap();

        let result = engine.restore_backup(&report.backup_id, None, true).unwrap();

        assert_eq!(result.restored_to, data_file);
        assert_eq!(fs::read_to_string(&data_file).unwrap(), ORIGINAL);
        let copy = result.safety_copy.unwrap();
        assert_eq!(fs::read_to_string(&copy).unwrap(), r#"{"contributors":[]}"#);
        assert!(copy.to_string_lossy().ends_with(".bak"));
        assert_eq!(safety_copies(temp.path()).len(), 1);
    }

    #[test]
    fn test_safety_copy_stamped_in_utc() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("data.json");
        fs::write(&dest, "{}").unwrap();
        let at: DateTime<Utc> = "2025-10-19T23:30:05Z".parse().unwrap();

        let first = write_safety_copy(&dest, at).unwrap();
        let second = write_safety_copy(&dest, at).unwrap();

        assert_eq!(first, temp.path().join("data.json.pre_restore_20251019_233005.bak"));
        assert_eq!(second, temp.path().join("data.json.pre_restore_20251019_233005_1.bak"));
    }

    #[test]
    fn test_restore_to_new_nested_destination() {
        let (mut engine, _data_file, temp) = setup();
        let report = engine.create_full(None, false, None).unwrap();
        let dest = temp.path().join("restored").join("deep").join("copy.json");

        let result = engine.restore_backup(&report.backup_id, Some(&dest), true).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), ORIGINAL);
        assert!(result.safety_copy.is_none());
        let record = engine.get_backup_info(&report.backup_id).unwrap();
        assert_eq!(result.created_at, record.created_at);
    }

    #[test]
    fn test_restore_without_safety_copy() {
        let (mut engine, data_file, temp) = setup();
        let report = engine.create_full(None, false, None).unwrap();
        fs::write(&data_file, "{}").unwrap();

        let result = engine.restore_backup(&report.backup_id, None, false).unwrap();
        assert!(result.safety_copy.is_none());
        assert!(safety_copies(temp.path()).is_empty());
    }

    #[test]
    fn test_unknown_backup_leaves_dest_alone() {
        let (engine, data_file, _temp) = setup();

        let err = engine.restore_backup("nope", None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fs::read_to_string(&data_file).unwrap(), ORIGINAL);
    }

    #[test]
    fn test_missing_artifact_leaves_dest_alone() {
        let (mut engine, data_file, temp) = setup();
        let report = engine.create_full(None, false, None).unwrap();
        fs::remove_file(&report.artifact_path).unwrap();
        fs::write(&data_file, "{\"changed\":true}").unwrap();

        let err = engine.restore_backup(&report.backup_id, None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArtifactMissing);
        assert_eq!(fs::read_to_string(&data_file).unwrap(), "{\"changed\":true}");
        assert!(safety_copies(temp.path()).is_empty());
    }

    #[test]
    fn test_corrupt_artifact_leaves_dest_alone() {
        let (mut engine, data_file, temp) = setup();
        let report = engine.create_full(None, true, None).unwrap();
        fs::write(&report.artifact_path, b"garbage").unwrap();
        fs::write(&data_file, "{\"changed\":true}").unwrap();

        let err = engine.restore_backup(&report.backup_id, None, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Corrupt);
        assert_eq!(fs::read_to_string(&data_file).unwrap(), "{\"changed\":true}");
        assert!(safety_copies(temp.path()).is_empty());
    }

    #[test]
    fn test_restore_latest_keyword() {
        let (mut engine, data_file, _temp) = setup();
        engine.create_full(None, false, None).unwrap();
        fs::write(&data_file, r#"{"v":2}"#).unwrap();
        engine.create_incremental(None, false, None).unwrap();
        fs::write(&data_file, "{}").unwrap();

        engine.restore_backup("latest", None, false).unwrap();
        assert_eq!(fs::read_to_string(&data_file).unwrap(), r#"{"v":2}"#);
    }
}

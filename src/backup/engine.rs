//! Backup engine for SnapKeep
//!
//! [`BackupEngine`] owns the backup directory, the in-memory index and the
//! change-detection cache. The strategies, verification, restore,
//! retention and reporting live in sibling modules as further `impl`
//! blocks on this type.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use super::index::{BackupIndex, INDEX_FILE};
use super::record::{BackupKind, BackupRecord};
use super::schedule::BackupSchedule;
use crate::config::{Settings, SnapKeepPaths};
use crate::error::{SnapKeepError, SnapKeepResult};
use crate::storage::{temp_sibling, IndexLock};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15);

/// Keyword accepted wherever a backup id is expected
pub const LATEST: &str = "latest";

/// Manages backup creation, verification, restore and retention
#[derive(Debug)]
pub struct BackupEngine {
    /// Directory holding artifacts and the index
    pub(crate) backup_dir: PathBuf,
    /// Snapshot backed up when no source is given
    pub(crate) data_file: PathBuf,
    pub(crate) index: BackupIndex,
    /// Fingerprint of the last successfully written backup
    pub(crate) last_backup_hash: Option<String>,
    lock_timeout: Duration,
}

impl BackupEngine {
    /// Open the engine on `backup_dir`, creating the directory if needed
    ///
    /// The index is loaded leniently and the change-detection cache is
    /// seeded from the most recent record, so an unchanged snapshot is not
    /// backed up again after a restart.
    pub fn open(backup_dir: impl Into<PathBuf>, data_file: impl Into<PathBuf>) -> SnapKeepResult<Self> {
        let backup_dir = backup_dir.into();

        if backup_dir.exists() && !backup_dir.is_dir() {
            return Err(SnapKeepError::Config(format!(
                "Backup path is not a directory: {}",
                backup_dir.display()
            )));
        }
        fs::create_dir_all(&backup_dir).map_err(|e| {
            SnapKeepError::Config(format!(
                "Failed to create backup directory {}: {}",
                backup_dir.display(),
                e
            ))
        })?;

        let index = BackupIndex::load(backup_dir.join(INDEX_FILE));
        let last_backup_hash = index
            .latest()
            .map(|r| r.content_hash.clone())
            .filter(|h| !h.is_empty());

        Ok(Self {
            backup_dir,
            data_file: data_file.into(),
            index,
            last_backup_hash,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// Open the engine using resolved paths and user settings
    pub fn from_settings(paths: &SnapKeepPaths, settings: &Settings) -> SnapKeepResult<Self> {
        Ok(Self::open(settings.backup_dir(paths), settings.data_file(paths))?
            .with_lock_timeout(settings.lock_timeout()))
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Get backup directory path
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Get the default snapshot path
    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn index(&self) -> &BackupIndex {
        &self.index
    }

    pub fn last_backup_hash(&self) -> Option<&str> {
        self.last_backup_hash.as_deref()
    }

    /// List backups, newest first
    pub fn list_backups(&self, limit: Option<usize>) -> Vec<&BackupRecord> {
        self.index.list(limit)
    }

    /// Look up a single backup by id (or `latest`)
    pub fn get_backup_info(&self, backup_id: &str) -> SnapKeepResult<&BackupRecord> {
        if backup_id.eq_ignore_ascii_case(LATEST) {
            return self
                .index
                .latest()
                .ok_or_else(|| SnapKeepError::backup_not_found(LATEST));
        }
        self.index
            .find(backup_id)
            .ok_or_else(|| SnapKeepError::backup_not_found(backup_id))
    }

    /// Get the most recent backup
    pub fn latest_backup(&self) -> Option<&BackupRecord> {
        self.index.latest()
    }

    /// Build declarative schedule metadata; nothing is executed
    pub fn schedule_backup(
        &self,
        interval_hours: u32,
        kind: BackupKind,
        compress: bool,
    ) -> SnapKeepResult<BackupSchedule> {
        BackupSchedule::new(interval_hours, kind, compress)
    }

    /// Take the advisory lock that serializes index writers
    pub(crate) fn lock(&self) -> SnapKeepResult<IndexLock> {
        let path = temp_sibling(self.index.path(), "lock");
        debug!(lock = %path.display(), "waiting for index lock");
        IndexLock::acquire(&path, self.lock_timeout)
    }

    pub(crate) fn source_or_default(&self, source: Option<&Path>) -> PathBuf {
        source
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.data_file.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_backup_dir() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = temp_dir.path().join("a").join("backups");

        let engine = BackupEngine::open(&backup_dir, temp_dir.path().join("data.json")).unwrap();
        assert!(backup_dir.is_dir());
        assert!(engine.index().is_empty());
        assert!(engine.last_backup_hash().is_none());
    }

    #[test]
    fn test_open_rejects_file_as_backup_dir() {
        let temp_dir = TempDir::new().unwrap();
        let not_a_dir = temp_dir.path().join("backups");
        fs::write(&not_a_dir, "x").unwrap();

        let err = BackupEngine::open(&not_a_dir, temp_dir.path().join("data.json")).unwrap_err();
        assert!(matches!(err, SnapKeepError::Config(_)));
    }

    #[test]
    fn test_get_unknown_backup() {
        let temp_dir = TempDir::new().unwrap();
        let engine = BackupEngine::open(temp_dir.path(), temp_dir.path().join("data.json")).unwrap();

        assert!(engine.get_backup_info("nope").unwrap_err().is_not_found());
        assert!(engine.get_backup_info(LATEST).unwrap_err().is_not_found());
    }

    #[test]
    fn test_from_settings_uses_configured_paths() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapKeepPaths::with_base_dir(temp_dir.path().to_path_buf());
        let mut settings = Settings::default();
        settings.backup_dir = Some(temp_dir.path().join("elsewhere"));

        let engine = BackupEngine::from_settings(&paths, &settings).unwrap();
        assert_eq!(engine.backup_dir(), temp_dir.path().join("elsewhere"));
        assert_eq!(engine.data_file(), paths.default_data_file());
    }

    #[test]
    fn test_schedule_rejects_zero_interval() {
        let temp_dir = TempDir::new().unwrap();
        let engine = BackupEngine::open(temp_dir.path(), temp_dir.path().join("data.json")).unwrap();

        assert!(engine.schedule_backup(0, BackupKind::Full, false).is_err());
        let schedule = engine.schedule_backup(24, BackupKind::Incremental, true).unwrap();
        assert_eq!(schedule.backup_type, BackupKind::Incremental);
    }
}

//! Durable registry of backup records
//!
//! The index is a single JSON array rewritten as a whole on every
//! mutation. Loading never fails: a missing or unparseable file leaves the
//! index empty and logs a warning, the artifacts themselves stay on disk.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::record::{BackupKind, BackupRecord};
use crate::error::{SnapKeepError, SnapKeepResult};
use crate::storage::{read_json, write_json_atomic};

/// Name of the index file inside the backup directory
pub const INDEX_FILE: &str = "backup_index.json";

/// In-memory view of `backup_index.json`
#[derive(Debug)]
pub struct BackupIndex {
    path: PathBuf,
    records: Vec<BackupRecord>,
}

impl BackupIndex {
    /// Load the index at `path`, starting empty if it is missing or corrupt
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = read_records(&path);
        debug!(index = %path.display(), count = records.len(), "loaded backup index");
        Self { path, records }
    }

    /// Re-read the on-disk index, replacing the in-memory records
    ///
    /// Unlike [`BackupIndex::load`] this is not lenient about I/O: a read
    /// failure is returned and the records in memory stay as they were, so
    /// the following `persist` cannot replace the catalog with a partial view.
    /// A file that reads but does not parse keeps the in-memory records.
    pub fn refresh(&mut self) -> SnapKeepResult<()> {
        match read_json::<Vec<BackupRecord>, _>(&self.path) {
            Ok(records) => {
                self.records = records;
                Ok(())
            }
            Err(SnapKeepError::Json(msg)) => {
                warn!(
                    index = %self.path.display(),
                    error = %msg,
                    "backup index does not parse, keeping records in memory"
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a record; ids must be unique
    pub fn append(&mut self, record: BackupRecord) -> SnapKeepResult<()> {
        if self.contains(&record.backup_id) {
            return Err(SnapKeepError::Validation(format!(
                "Backup id already exists: {}",
                record.backup_id
            )));
        }
        self.records.push(record);
        Ok(())
    }

    /// Drop a record, returning it if it was present
    pub fn remove(&mut self, backup_id: &str) -> Option<BackupRecord> {
        let pos = self.records.iter().position(|r| r.backup_id == backup_id)?;
        Some(self.records.remove(pos))
    }

    /// Write the whole record set (temp file + atomic rename)
    pub fn persist(&self) -> SnapKeepResult<()> {
        write_json_atomic(&self.path, &self.records)
    }

    pub fn find(&self, backup_id: &str) -> Option<&BackupRecord> {
        self.records.iter().find(|r| r.backup_id == backup_id)
    }

    pub fn contains(&self, backup_id: &str) -> bool {
        self.find(backup_id).is_some()
    }

    /// Records newest first, optionally truncated to `limit`
    pub fn list(&self, limit: Option<usize>) -> Vec<&BackupRecord> {
        let mut sorted: Vec<&BackupRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            sorted.truncate(limit);
        }
        sorted
    }

    /// Most recent record of any kind
    pub fn latest(&self) -> Option<&BackupRecord> {
        self.records.iter().max_by_key(|r| r.created_at)
    }

    /// Most recent record of the given kind, scanning from the end of the log
    pub fn latest_of_kind(&self, kind: BackupKind) -> Option<&BackupRecord> {
        self.records.iter().rev().find(|r| r.kind == kind)
    }

    /// Records in insertion order
    pub fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn read_records(path: &Path) -> Vec<BackupRecord> {
    match read_json::<Vec<BackupRecord>, _>(path) {
        Ok(records) => records,
        Err(e) => {
            warn!(
                index = %path.display(),
                error = %e,
                "could not load backup index, starting with an empty catalog"
            );
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn record(id: &str, kind: BackupKind, minutes: i64) -> BackupRecord {
        BackupRecord {
            backup_id: id.to_string(),
            kind,
            created_at: Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            description: None,
            source_path: PathBuf::from("data.json"),
            content_hash: format!("hash-{}", id),
            original_size: 10,
            stored_size: 10,
            compressed: false,
            compression_ratio: None,
            artifact_name: format!("{}.json", id),
            based_on: None,
        }
    }

    #[test]
    fn test_missing_index_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let index = BackupIndex::load(temp_dir.path().join(INDEX_FILE));
        assert!(index.is_empty());
    }

    #[test]
    fn test_corrupt_index_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INDEX_FILE);
        fs::write(&path, "[{ this is not json").unwrap();

        let index = BackupIndex::load(&path);
        assert!(index.is_empty());
        // The broken file is left for inspection
        assert!(path.exists());
    }

    #[test]
    fn test_persist_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INDEX_FILE);

        let mut index = BackupIndex::load(&path);
        index.append(record("a", BackupKind::Full, 0)).unwrap();
        index.append(record("b", BackupKind::Incremental, 5)).unwrap();
        index.persist().unwrap();

        let reloaded = BackupIndex::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.find("b").unwrap().kind, BackupKind::Incremental);
        assert!(!temp_dir.path().join("backup_index.json.tmp").exists());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = BackupIndex::load(temp_dir.path().join(INDEX_FILE));

        index.append(record("a", BackupKind::Full, 0)).unwrap();
        assert!(index.append(record("a", BackupKind::Full, 1)).is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_list_sorted_newest_first_with_limit() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = BackupIndex::load(temp_dir.path().join(INDEX_FILE));
        index.append(record("old", BackupKind::Full, 0)).unwrap();
        index.append(record("new", BackupKind::Full, 20)).unwrap();
        index.append(record("mid", BackupKind::Full, 10)).unwrap();

        let ids: Vec<_> = index.list(None).iter().map(|r| r.backup_id.clone()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);

        assert_eq!(index.list(Some(1))[0].backup_id, "new");
        assert_eq!(index.latest().unwrap().backup_id, "new");
    }

    #[test]
    fn test_latest_of_kind_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let mut index = BackupIndex::load(temp_dir.path().join(INDEX_FILE));
        index.append(record("f1", BackupKind::Full, 0)).unwrap();
        index.append(record("f2", BackupKind::Full, 1)).unwrap();
        index.append(record("i1", BackupKind::Incremental, 2)).unwrap();

        assert_eq!(index.latest_of_kind(BackupKind::Full).unwrap().backup_id, "f2");
        assert!(index.latest_of_kind(BackupKind::Differential).is_none());

        assert_eq!(index.remove("f2").unwrap().backup_id, "f2");
        assert!(index.remove("f2").is_none());
        assert_eq!(index.latest_of_kind(BackupKind::Full).unwrap().backup_id, "f1");
    }

    #[test]
    fn test_refresh_sees_other_writer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INDEX_FILE);

        let mut ours = BackupIndex::load(&path);
        let mut theirs = BackupIndex::load(&path);
        theirs.append(record("x", BackupKind::Full, 0)).unwrap();
        theirs.persist().unwrap();

        assert!(ours.is_empty());
        ours.refresh().unwrap();
        assert!(ours.contains("x"));
    }

    #[test]
    fn test_refresh_read_failure_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INDEX_FILE);

        let mut index = BackupIndex::load(&path);
        index.append(record("a", BackupKind::Full, 0)).unwrap();
        index.append(record("b", BackupKind::Full, 1)).unwrap();
        index.persist().unwrap();

        // A directory in place of the file makes every read fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let err = index.refresh().unwrap_err();
        assert!(matches!(err, SnapKeepError::Io(_)));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_refresh_unparseable_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(INDEX_FILE);

        let mut index = BackupIndex::load(&path);
        index.append(record("a", BackupKind::Full, 0)).unwrap();
        fs::write(&path, "[{ garbage").unwrap();

        index.refresh().unwrap();
        assert!(index.contains("a"));
    }
}

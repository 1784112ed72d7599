//! User settings for SnapKeep
//!
//! Manages where backups live, which snapshot file is backed up, the
//! retention policy used by `prune`, and an optional declarative schedule.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::SnapKeepPaths;
use crate::backup::BackupSchedule;
use crate::error::SnapKeepError;
use crate::storage::{read_json, write_json_atomic};

/// Backup retention settings
///
/// A backup survives cleanup if it is among the `keep_count` newest OR
/// younger than `keep_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Number of most recent backups always kept
    pub keep_count: usize,
    /// Backups younger than this many days are always kept
    pub keep_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            keep_count: 10,
            keep_days: 30,
        }
    }
}

/// User settings for SnapKeep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Backup directory; defaults to `<base>/backups`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Snapshot file to back up; defaults to `<base>/data.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Whether new backups are gzip-compressed by default
    #[serde(default)]
    pub compress: bool,

    /// Retention policy applied by cleanup
    #[serde(default)]
    pub retention: RetentionPolicy,

    /// How long to wait for the index lock before giving up
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Declarative backup schedule, if one was saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<BackupSchedule>,
}

fn default_schema_version() -> u32 {
    1
}

fn default_lock_timeout_secs() -> u64 {
    15
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            backup_dir: None,
            data_file: None,
            compress: false,
            retention: RetentionPolicy::default(),
            lock_timeout_secs: default_lock_timeout_secs(),
            schedule: None,
        }
    }
}

impl Settings {
    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &SnapKeepPaths) -> Result<Self, SnapKeepError> {
        read_json(paths.settings_file()).map_err(|e| match e {
            SnapKeepError::Json(msg) => {
                SnapKeepError::Config(format!("Failed to parse settings file: {}", msg))
            }
            other => other,
        })
    }

    /// Save settings to disk
    pub fn save(&self, paths: &SnapKeepPaths) -> Result<(), SnapKeepError> {
        paths.ensure_directories()?;
        write_json_atomic(paths.settings_file(), self)
    }

    /// Effective backup directory
    pub fn backup_dir(&self, paths: &SnapKeepPaths) -> PathBuf {
        self.backup_dir
            .clone()
            .unwrap_or_else(|| paths.backup_dir())
    }

    /// Effective snapshot file
    pub fn data_file(&self, paths: &SnapKeepPaths) -> PathBuf {
        self.data_file
            .clone()
            .unwrap_or_else(|| paths.default_data_file())
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }
}

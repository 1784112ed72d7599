//! Backup metadata records
//!
//! One [`BackupRecord`] is written to the index per created backup. The
//! on-disk shape is kept compatible with existing `backup_index.json`
//! files, so the record is converted through a wire struct on the way in
//! and out.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SnapKeepError;

/// Backup strategy that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
    Differential,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
            Self::Differential => "differential",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupKind {
    type Err = SnapKeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "incremental" | "incr" => Ok(Self::Incremental),
            "differential" | "diff" => Ok(Self::Differential),
            other => Err(SnapKeepError::Validation(format!(
                "Unknown backup type '{}' (expected full, incremental or differential)",
                other
            ))),
        }
    }
}

/// Metadata about one stored backup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecordWire", into = "RecordWire")]
pub struct BackupRecord {
    /// Unique id, also the artifact file stem
    pub backup_id: String,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub description: Option<String>,
    /// Snapshot file that was backed up
    pub source_path: PathBuf,
    /// Fingerprint of the source bytes at backup time
    pub content_hash: String,
    pub original_size: u64,
    /// Size of the artifact on disk
    pub stored_size: u64,
    pub compressed: bool,
    /// `1 - stored_size / original_size`, only for compressed backups
    pub compression_ratio: Option<f64>,
    /// Artifact filename relative to the backup directory
    pub artifact_name: String,
    /// Full backup a differential was taken against
    pub based_on: Option<String>,
}

impl BackupRecord {
    /// Where the artifact for this record lives
    pub fn artifact_path(&self, backup_dir: &Path) -> PathBuf {
        backup_dir.join(&self.artifact_name)
    }

    /// Age of the backup relative to `now`
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

/// Serialized layout of a record inside `backup_index.json`
#[derive(Serialize, Deserialize)]
struct RecordWire {
    backup_id: String,
    #[serde(rename = "type")]
    kind: BackupKind,
    #[serde(with = "timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(default)]
    description: String,
    source_file: PathBuf,
    #[serde(default)]
    file_hash: String,
    #[serde(default)]
    original_size: u64,
    #[serde(default)]
    compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compressed_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compression_ratio: Option<f64>,
    backup_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    based_on: Option<String>,
}

impl From<RecordWire> for BackupRecord {
    fn from(wire: RecordWire) -> Self {
        let stored_size = if wire.compressed {
            wire.compressed_size.or(wire.file_size)
        } else {
            wire.file_size.or(wire.compressed_size)
        }
        .unwrap_or(0);

        // Older writers stored the ratio as a percentage
        let compression_ratio = wire
            .compression_ratio
            .map(|r| if r.abs() > 1.0 { r / 100.0 } else { r });

        Self {
            backup_id: wire.backup_id,
            kind: wire.kind,
            created_at: wire.timestamp,
            description: Some(wire.description).filter(|d| !d.is_empty()),
            source_path: wire.source_file,
            content_hash: wire.file_hash,
            original_size: wire.original_size,
            stored_size,
            compressed: wire.compressed,
            compression_ratio,
            artifact_name: wire.backup_file,
            based_on: wire.based_on,
        }
    }
}

impl From<BackupRecord> for RecordWire {
    fn from(record: BackupRecord) -> Self {
        let (file_size, compressed_size) = if record.compressed {
            (None, Some(record.stored_size))
        } else {
            (Some(record.stored_size), None)
        };

        Self {
            backup_id: record.backup_id,
            kind: record.kind,
            timestamp: record.created_at,
            description: record.description.unwrap_or_default(),
            source_file: record.source_path,
            file_hash: record.content_hash,
            original_size: record.original_size,
            compressed: record.compressed,
            file_size,
            compressed_size,
            compression_ratio: record.compression_ratio,
            backup_file: record.artifact_name,
            based_on: record.based_on,
        }
    }
}

/// ISO-8601 timestamps: RFC 3339 on write, naive local time accepted on read
pub(crate) mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

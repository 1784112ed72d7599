//! Full, incremental and differential backups
//!
//! All three strategies share a single physical write path. They differ
//! only in whether the write happens at all (incremental skips unchanged
//! content) and in the `kind`/`based_on` bookkeeping. Every variant stores
//! a complete copy of the source.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use tracing::{debug, info};

use super::engine::BackupEngine;
use super::fingerprint::{self, HashingReader, CHUNK_SIZE};
use super::record::{BackupKind, BackupRecord};
use crate::error::{SnapKeepError, SnapKeepResult};
use crate::storage::temp_sibling;

/// Details of a backup that was written
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub backup_id: String,
    #[serde(rename = "type")]
    pub kind: BackupKind,
    pub artifact_path: PathBuf,
    pub original_size: u64,
    pub stored_size: u64,
    pub compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
}

/// Result of an incremental backup, which may skip the write
#[derive(Debug, Clone, Serialize)]
pub struct IncrementalReport {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(flatten)]
    pub backup: Option<BackupReport>,
}

impl IncrementalReport {
    fn created(report: BackupReport) -> Self {
        Self {
            skipped: false,
            reason: None,
            backup: Some(report),
        }
    }

    fn skipped() -> Self {
        Self {
            skipped: true,
            reason: Some("No changes detected since last backup".to_string()),
            backup: None,
        }
    }
}

/// Sizes and fingerprint captured while writing an artifact
struct ArtifactStats {
    content_hash: String,
    original_size: u64,
    stored_size: u64,
}

impl BackupEngine {
    /// Create a full backup of `source` (or the configured data file)
    pub fn create_full(
        &mut self,
        source: Option<&Path>,
        compress: bool,
        description: Option<&str>,
    ) -> SnapKeepResult<BackupReport> {
        let source = self.source_or_default(source);
        self.write_backup(&source, compress, description, BackupKind::Full)
    }

    /// Back up only if the content changed since the last successful backup
    pub fn create_incremental(
        &mut self,
        source: Option<&Path>,
        compress: bool,
        description: Option<&str>,
    ) -> SnapKeepResult<IncrementalReport> {
        let source = self.source_or_default(source);
        let current = fingerprint::hash_file(&source)?;

        if self.last_backup_hash.as_deref() == Some(current.as_str()) {
            debug!(source = %source.display(), hash = %current, "content unchanged, skipping backup");
            return Ok(IncrementalReport::skipped());
        }

        self.write_backup(&source, compress, description, BackupKind::Incremental)
            .map(IncrementalReport::created)
    }

    /// Back up and tag the result against the most recent full backup
    ///
    /// With no full backup in the index this is a plain full backup.
    pub fn create_differential(
        &mut self,
        source: Option<&Path>,
        compress: bool,
        description: Option<&str>,
    ) -> SnapKeepResult<BackupReport> {
        let source = self.source_or_default(source);
        self.write_backup(&source, compress, description, BackupKind::Differential)
    }

    fn write_backup(
        &mut self,
        source: &Path,
        compress: bool,
        description: Option<&str>,
        requested: BackupKind,
    ) -> SnapKeepResult<BackupReport> {
        if !source.is_file() {
            return Err(SnapKeepError::file_not_found(source));
        }

        let _lock = self.lock()?;
        self.index.refresh()?;

        let (kind, based_on) = match requested {
            BackupKind::Differential => match self.index.latest_of_kind(BackupKind::Full) {
                Some(full) => (BackupKind::Differential, Some(full.backup_id.clone())),
                None => {
                    info!("no full backup in the index, differential falls back to full");
                    (BackupKind::Full, None)
                }
            },
            other => (other, None),
        };

        let created_at = Utc::now();
        let backup_id = self.allocate_id(created_at);
        let extension = if compress { "json.gz" } else { "json" };
        let artifact_name = format!("{}.{}", backup_id, extension);
        let artifact_path = self.backup_dir.join(&artifact_name);

        let stats = write_artifact(source, &artifact_path, compress)?;
        let compression_ratio = (compress && stats.original_size > 0)
            .then(|| 1.0 - stats.stored_size as f64 / stats.original_size as f64);

        let record = BackupRecord {
            backup_id: backup_id.clone(),
            kind,
            created_at,
            description: description.map(str::to_string).filter(|d| !d.is_empty()),
            source_path: source.to_path_buf(),
            content_hash: stats.content_hash.clone(),
            original_size: stats.original_size,
            stored_size: stats.stored_size,
            compressed: compress,
            compression_ratio,
            artifact_name,
            based_on: based_on.clone(),
        };

        // The artifact is durable at this point; only now does it enter the index
        self.index.append(record)?;
        if let Err(e) = self.index.persist() {
            self.index.remove(&backup_id);
            let _ = fs::remove_file(&artifact_path);
            return Err(e);
        }

        self.last_backup_hash = Some(stats.content_hash);

        info!(
            backup_id = %backup_id,
            kind = %kind,
            stored_size = stats.stored_size,
            compressed = compress,
            "backup created"
        );

        Ok(BackupReport {
            backup_id,
            kind,
            artifact_path,
            original_size: stats.original_size,
            stored_size: stats.stored_size,
            compressed: compress,
            compression_ratio,
            based_on,
        })
    }

    /// Pick an unused id for a backup taken at `at`
    ///
    /// Ids are second-resolution; later backups in the same second get a
    /// `_1`, `_2`, ... suffix.
    fn allocate_id(&self, at: DateTime<Utc>) -> String {
        let base = format!("backup_full_{}", at.format("%Y%m%d_%H%M%S"));
        if !self.id_taken(&base) {
            return base;
        }
        (1u32..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| !self.id_taken(candidate))
            .unwrap_or(base)
    }

    fn id_taken(&self, id: &str) -> bool {
        self.index.contains(id)
            || self.backup_dir.join(format!("{}.json", id)).exists()
            || self.backup_dir.join(format!("{}.json.gz", id)).exists()
    }
}

/// Stream `source` into `dest`, hashing the bytes on the way
///
/// Data goes to a `.partial` sibling first and is renamed into place only
/// after it has been flushed and synced.
fn write_artifact(source: &Path, dest: &Path, compress: bool) -> SnapKeepResult<ArtifactStats> {
    let partial = temp_sibling(dest, "partial");

    let stats = match copy_into(source, &partial, compress) {
        Ok(stats) => stats,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(SnapKeepError::Io(format!(
                "Failed to write backup artifact {}: {}",
                dest.display(),
                e
            )));
        }
    };

    fs::rename(&partial, dest).map_err(|e| {
        let _ = fs::remove_file(&partial);
        SnapKeepError::Io(format!("Failed to finalize backup artifact: {}", e))
    })?;

    Ok(stats)
}

fn copy_into(source: &Path, dest: &Path, compress: bool) -> io::Result<ArtifactStats> {
    let input = File::open(source)?;
    let mut reader = HashingReader::new(BufReader::with_capacity(CHUNK_SIZE, input));
    let writer = BufWriter::new(File::create(dest)?);

    let writer = if compress {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        io::copy(&mut reader, &mut encoder)?;
        encoder.finish()?
    } else {
        let mut writer = writer;
        io::copy(&mut reader, &mut writer)?;
        writer
    };
    let stored_size = seal(writer)?;

    let (content_hash, original_size) = reader.finish();
    Ok(ArtifactStats {
        content_hash,
        original_size,
        stored_size,
    })
}

/// Flush and fsync, returning the final file size
fn seal(mut writer: BufWriter<File>) -> io::Result<u64> {
    writer.flush()?;
    let file = writer.get_ref();
    file.sync_all()?;
    Ok(file.metadata()?.len())
}

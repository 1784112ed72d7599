//! Backup system for SnapKeep
//!
//! Provides full, incremental and differential backups of a single JSON
//! snapshot file, with integrity verification, safe restore and retention
//! cleanup.
//!
//! # Architecture
//!
//! Everything hangs off one explicitly constructed [`BackupEngine`]:
//!
//! - `fingerprint`: streaming content hashes for change detection
//! - `index`: the `backup_index.json` catalog of [`BackupRecord`]s
//! - `creator`: the three backup strategies sharing one write path
//! - `verify`: integrity checks that never modify state
//! - `restore`: restore with a pre-restore safety copy
//! - `retention`: count/age based cleanup
//! - `summary`: statistics and exportable summaries
//! - `schedule`: declarative schedule metadata
//!
//! # Backup Directory Layout
//!
//! - `backup_index.json`: JSON array of backup records
//! - `backup_full_<YYYYMMDD_HHMMSS>.json`: plain artifacts
//! - `backup_full_<YYYYMMDD_HHMMSS>.json.gz`: gzip-compressed artifacts
//!
//! Restores save the previous destination as
//! `<dest>.pre_restore_<YYYYMMDD_HHMMSS>.bak`. Both stamps are UTC.
//!
//! # Example
//!
//! ```rust,ignore
//! use snapkeep::backup::BackupEngine;
//!
//! let mut engine = BackupEngine::open("backups", "contributors.json")?;
//! let report = engine.create_full(None, true, Some("before migration"))?;
//!
//! assert!(engine.verify_backup(&report.backup_id).valid);
//! engine.restore_backup(&report.backup_id, None, true)?;
//! engine.cleanup_old_backups(10, 30)?;
//! ```

mod creator;
mod engine;
pub mod fingerprint;
mod index;
mod outcome;
mod record;
mod restore;
mod retention;
mod schedule;
mod summary;
mod verify;

pub use creator::{BackupReport, IncrementalReport};
pub use engine::{BackupEngine, LATEST};
pub use index::{BackupIndex, INDEX_FILE};
pub use outcome::{ErrorReport, Outcome};
pub use record::{BackupKind, BackupRecord};
pub use restore::RestoreReport;
pub use retention::{plan_retention, CleanupReport, RetentionPlan};
pub use schedule::BackupSchedule;
pub use summary::{BackupStatistics, BackupSummary, SummaryEntry, SummaryFormat};
pub use verify::{Verification, VerifyFailure};

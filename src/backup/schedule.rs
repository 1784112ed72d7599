//! Declarative backup schedules
//!
//! A schedule only describes cadence. Running backups on time is left to
//! whatever timer loop the caller drives; that loop can use
//! [`BackupSchedule::is_due`] and [`BackupSchedule::advance`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::record::BackupKind;
use crate::error::{SnapKeepError, SnapKeepResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSchedule {
    pub schedule_id: String,
    pub interval_hours: u32,
    pub backup_type: BackupKind,
    pub compress: bool,
    pub created_at: DateTime<Utc>,
    pub next_backup: DateTime<Utc>,
    pub active: bool,
}

impl BackupSchedule {
    pub fn new(interval_hours: u32, backup_type: BackupKind, compress: bool) -> SnapKeepResult<Self> {
        Self::new_at(interval_hours, backup_type, compress, Utc::now())
    }

    pub fn new_at(
        interval_hours: u32,
        backup_type: BackupKind,
        compress: bool,
        now: DateTime<Utc>,
    ) -> SnapKeepResult<Self> {
        if interval_hours == 0 {
            return Err(SnapKeepError::Config(
                "Backup interval must be at least one hour".into(),
            ));
        }

        let next_backup = now
            .checked_add_signed(Self::interval_of(interval_hours))
            .ok_or_else(|| {
                SnapKeepError::Config(format!(
                    "Backup interval of {} hours is out of range",
                    interval_hours
                ))
            })?;

        Ok(Self {
            schedule_id: format!("schedule_{}", now.format("%Y%m%d_%H%M%S")),
            interval_hours,
            backup_type,
            compress,
            created_at: now,
            next_backup,
            active: true,
        })
    }

    fn interval_of(hours: u32) -> Duration {
        Duration::hours(i64::from(hours))
    }

    pub fn interval(&self) -> Duration {
        Self::interval_of(self.interval_hours)
    }

    /// Whether a backup should run at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.active && now >= self.next_backup
    }

    /// Move `next_backup` past `now` after a run
    ///
    /// A schedule whose next run would fall outside the representable
    /// calendar is deactivated.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        while self.next_backup <= now {
            match self.next_backup.checked_add_signed(self.interval()) {
                Some(next) => self.next_backup = next,
                None => {
                    self.active = false;
                    break;
                }
            }
        }
    }
}

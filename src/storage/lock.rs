//! Advisory lock file guarding the backup index
//!
//! Writers that share a backup directory take this lock before touching
//! `backup_index.json`. The lock is a file created with exclusive-create
//! semantics and removed again when the guard is dropped.
//!
//! The file holds the owner's pid. A lock whose owner is no longer running
//! (or, where liveness cannot be checked, one older than [`STALE_AFTER`])
//! is treated as abandoned and broken.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{SnapKeepError, SnapKeepResult};

const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Age after which a lock with no checkable owner is considered abandoned
pub const STALE_AFTER: Duration = Duration::from_secs(10 * 60);

/// Held lock; released on drop
#[derive(Debug)]
pub struct IndexLock {
    path: PathBuf,
}

impl IndexLock {
    /// Acquire the lock at `path`, retrying until `timeout` elapses
    pub fn acquire(path: &Path, timeout: Duration) -> SnapKeepResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SnapKeepError::Io(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(lock = %path.display(), "acquired index lock");
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        warn!(lock = %path.display(), "breaking stale index lock");
                        match fs::remove_file(path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => {
                                return Err(SnapKeepError::Io(format!(
                                    "Failed to remove stale lock {}: {}",
                                    path.display(),
                                    e
                                )))
                            }
                        }
                    }
                    if Instant::now() >= deadline {
                        return Err(SnapKeepError::Locked(format!(
                            "timed out waiting for {}",
                            path.display()
                        )));
                    }
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(e) => {
                    return Err(SnapKeepError::Io(format!(
                        "Failed to acquire lock {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Whether the lock at `path` was left behind by a dead owner
fn is_stale(path: &Path) -> bool {
    let owner = fs::read_to_string(path)
        .ok()
        .and_then(|content| content.trim().parse::<u32>().ok());

    match owner.and_then(owner_alive) {
        Some(alive) => !alive,
        None => lock_age(path).is_some_and(|age| age >= STALE_AFTER),
    }
}

fn lock_age(path: &Path) -> Option<Duration> {
    fs::metadata(path).ok()?.modified().ok()?.elapsed().ok()
}

/// `None` when liveness cannot be determined
#[cfg(unix)]
fn owner_alive(pid: u32) -> Option<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).ok().filter(|p| *p > 0)?;
    match kill(Pid::from_raw(raw), None::<Signal>) {
        Ok(()) => Some(true),
        Err(Errno::ESRCH) => Some(false),
        // EPERM: the process exists but belongs to someone else
        Err(_) => Some(true),
    }
}

#[cfg(not(unix))]
fn owner_alive(_pid: u32) -> Option<bool> {
    None
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(lock = %self.path.display(), error = %e, "failed to release index lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_released_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");

        {
            let lock = IndexLock::acquire(&path, Duration::from_millis(100)).unwrap();
            assert!(lock.path().exists());
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_second_acquire_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");

        let _held = IndexLock::acquire(&path, Duration::from_millis(100)).unwrap();
        let err = IndexLock::acquire(&path, Duration::from_millis(120)).unwrap_err();

        assert!(matches!(err, SnapKeepError::Locked(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_dead_owner_lock_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");
        // Above any real pid_max, so no process can own it
        fs::write(&path, "2147483647\n").unwrap();

        let lock = IndexLock::acquire(&path, Duration::from_millis(200)).unwrap();
        let owner = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_live_owner_lock_is_respected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");
        fs::write(&path, format!("{}\n", std::process::id())).unwrap();

        let err = IndexLock::acquire(&path, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, SnapKeepError::Locked(_)));
        assert!(path.exists());
    }

    #[test]
    fn test_fresh_ownerless_lock_is_respected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");
        fs::write(&path, "").unwrap();

        let err = IndexLock::acquire(&path, Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, SnapKeepError::Locked(_)));
    }

    #[test]
    fn test_reacquire_after_release() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("index.lock");

        drop(IndexLock::acquire(&path, Duration::from_millis(100)).unwrap());
        assert!(IndexLock::acquire(&path, Duration::from_millis(100)).is_ok());
    }
}

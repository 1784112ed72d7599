//! Path management for SnapKeep
//!
//! Provides XDG-compliant path resolution for configuration, data, and backups.
//!
//! ## Path Resolution Order
//!
//! 1. `SNAPKEEP_HOME` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/snapkeep` or `~/.config/snapkeep`
//! 3. Windows: `%APPDATA%\snapkeep`

use std::path::PathBuf;

use crate::error::SnapKeepError;

/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "SNAPKEEP_HOME";

/// Manages all paths used by SnapKeep
#[derive(Debug, Clone)]
pub struct SnapKeepPaths {
    /// Base directory for all SnapKeep data
    base_dir: PathBuf,
}

impl SnapKeepPaths {
    /// Create a new SnapKeepPaths instance
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, SnapKeepError> {
        let base_dir = match std::env::var(HOME_ENV) {
            Ok(custom) if !custom.is_empty() => PathBuf::from(custom),
            _ => resolve_default_path()?,
        };

        Ok(Self { base_dir })
    }

    /// Create SnapKeepPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/snapkeep/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the default backup directory (~/.config/snapkeep/backups/)
    pub fn backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the snapshot file backed up when none is configured
    pub fn default_data_file(&self) -> PathBuf {
        self.base_dir.join("data.json")
    }

    /// Ensure the base directory exists
    pub fn ensure_directories(&self) -> Result<(), SnapKeepError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| SnapKeepError::Io(format!("Failed to create base directory: {}", e)))
    }
}

/// Resolve the default base directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, SnapKeepError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("snapkeep"));
        }
    }
    let home = std::env::var("HOME")
        .map_err(|_| SnapKeepError::Config("HOME environment variable not set".into()))?;
    Ok(PathBuf::from(home).join(".config").join("snapkeep"))
}

/// Resolve the default base directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, SnapKeepError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| SnapKeepError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("snapkeep"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_custom_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapKeepPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert_eq!(paths.base_dir(), temp_dir.path());
        assert_eq!(paths.backup_dir(), temp_dir.path().join("backups"));
        assert_eq!(paths.settings_file(), temp_dir.path().join("config.json"));
        assert_eq!(paths.default_data_file(), temp_dir.path().join("data.json"));
    }

    #[test]
    fn test_env_var_override() {
        let temp_dir = TempDir::new().unwrap();
        let custom_path = temp_dir.path().to_str().unwrap();

        env::set_var(HOME_ENV, custom_path);
        let paths = SnapKeepPaths::new().unwrap();
        env::remove_var(HOME_ENV);

        assert_eq!(paths.base_dir(), temp_dir.path());
    }

    #[test]
    fn test_ensure_directories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = SnapKeepPaths::with_base_dir(temp_dir.path().join("nested"));

        paths.ensure_directories().unwrap();
        assert!(paths.base_dir().exists());
    }
}

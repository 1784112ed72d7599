//! Custom error types for SnapKeep
//!
//! This module defines the error hierarchy for the engine using thiserror
//! for ergonomic error definitions. Every variant maps onto one of the
//! coarse [`ErrorKind`] categories that callers branch on.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for SnapKeep operations
#[derive(Error, Debug)]
pub enum SnapKeepError {
    /// Configuration-related errors (bad backup directory, bad settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Invalid arguments passed by a caller
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// The index knows about a backup but its artifact is gone
    #[error("Backup artifact missing for {backup_id}: {}", path.display())]
    ArtifactMissing { backup_id: String, path: PathBuf },

    /// Artifact unreadable or structurally invalid
    #[error("Backup is corrupt: {0}")]
    Corrupt(String),

    /// The backup directory is held by another writer
    #[error("Backup directory is locked: {0}")]
    Locked(String),
}

/// Coarse failure categories exposed to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    ArtifactMissing,
    Corrupt,
    IoFailure,
    ConfigurationError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "NotFound",
            Self::ArtifactMissing => "ArtifactMissing",
            Self::Corrupt => "Corrupt",
            Self::IoFailure => "IOFailure",
            Self::ConfigurationError => "ConfigurationError",
        };
        f.write_str(name)
    }
}

impl SnapKeepError {
    /// Create a "not found" error for backups
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for files on disk
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            entity_type: "File",
            identifier: path.into().display().to_string(),
        }
    }

    /// Map this error onto its collaborator-facing category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ArtifactMissing { .. } => ErrorKind::ArtifactMissing,
            Self::Corrupt(_) => ErrorKind::Corrupt,
            Self::Io(_) | Self::Json(_) | Self::Locked(_) => ErrorKind::IoFailure,
            Self::Config(_) | Self::Validation(_) => ErrorKind::ConfigurationError,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<std::io::Error> for SnapKeepError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SnapKeepError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for SnapKeep operations
pub type SnapKeepResult<T> = Result<T, SnapKeepError>;

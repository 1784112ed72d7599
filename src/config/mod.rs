//! Configuration module for SnapKeep
//!
//! This module provides configuration management including:
//! - XDG-compliant path resolution
//! - User settings persistence
//! - Retention policy defaults

pub mod paths;
pub mod settings;

pub use paths::SnapKeepPaths;
pub use settings::{RetentionPolicy, Settings};

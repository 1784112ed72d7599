//! SnapKeep - versioned backups for a JSON snapshot file
//!
//! This library backs up a single JSON data file into a backup directory,
//! keeps a catalog of every backup taken, and can verify, restore and prune
//! those backups.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `storage`: Atomic file writes and the index lock
//! - `backup`: The backup engine and its operations
//! - `display`: Terminal formatting
//! - `cli`: Command handlers for the `snapkeep` binary
//! - `logging`: tracing subscriber setup
//!
//! # Example
//!
//! ```rust,ignore
//! use snapkeep::backup::BackupEngine;
//! use snapkeep::config::{Settings, SnapKeepPaths};
//!
//! let paths = SnapKeepPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let mut engine = BackupEngine::from_settings(&paths, &settings)?;
//! engine.create_full(None, settings.compress, None)?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod storage;

pub use error::{SnapKeepError, SnapKeepResult};

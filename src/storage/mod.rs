//! Storage layer for SnapKeep
//!
//! Provides JSON file storage with atomic writes and the advisory lock
//! used to serialize writers sharing a backup directory.

pub mod file_io;
pub mod lock;

pub use file_io::{read_json, temp_sibling, write_bytes_atomic, write_json_atomic};
pub use lock::IndexLock;

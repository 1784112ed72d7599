//! Display formatting for terminal output
//!
//! Provides utilities for formatting backup records and reports for
//! terminal display.

pub mod backup;

pub use backup::{
    format_backup_details, format_backup_list, format_cleanup, format_duration,
    format_retention_plan, format_size, format_statistics, format_verification,
};

//! Utility modules for the backup orchestrator.

pub mod errors;
pub mod format;
pub mod logger;

pub use errors::{BackupError, Result};

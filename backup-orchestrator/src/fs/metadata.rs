//! File metadata lookups used by snapshots and retention.

use chrono::{DateTime, Utc};
use std::fs;
use std::path::Path;

/// The subset of filesystem metadata the store records
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Last modified time
    pub modified: DateTime<Utc>,

    /// Regular file (after following symlinks)?
    pub is_file: bool,
}

impl FileMetadata {
    /// Extract metadata from a file path, following symlinks
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::metadata(path)?;

        Ok(Self {
            modified: DateTime::<Utc>::from(metadata.modified()?),
            is_file: metadata.is_file(),
        })
    }
}

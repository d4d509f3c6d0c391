//! Custom error types for the backup orchestrator.

use crate::tiers::TierName;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("File access error on {path}: {reason}")]
    FileAccess { path: PathBuf, reason: String },

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Corrupt metadata in {path}: {reason}")]
    MetadataCorruption { path: PathBuf, reason: String },

    #[error("Archive error on {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Snapshot {run_id} stored no files ({failed} failed)")]
    SnapshotEmpty { run_id: String, failed: usize },

    #[error("Tier {tier} failed: {reason}")]
    Tier { tier: TierName, reason: String },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackupError {
    pub fn archive(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MetadataCorruption {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Files that were attempted but not stored, when the error knows about them.
    pub fn failed_file_count(&self) -> usize {
        match self {
            Self::SnapshotEmpty { failed, .. } => *failed,
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, BackupError>;

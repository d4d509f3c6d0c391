//! Snapshot metadata persisted as `backup-metadata.json`.
//!
//! The metadata file sits next to the copied files in a loose snapshot and at
//! the root of an archived one. It records one [`FileRecord`] per file handed
//! to the snapshot, stored or not.

use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "backup-metadata.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Failed,
}

/// Outcome for one file of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub source: PathBuf,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    #[serde(default)]
    pub size: u64,

    pub status: FileStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Short classification of the failure (`NotFound`, `NotAFile`, `PermissionDenied`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl FileRecord {
    pub fn stored(source: PathBuf, destination: PathBuf, size: u64) -> Self {
        Self {
            source,
            destination: Some(destination),
            size,
            status: FileStatus::Success,
            error: None,
            error_type: None,
        }
    }

    pub fn failed(source: PathBuf, error_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            source,
            destination: None,
            size: 0,
            status: FileStatus::Failed,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FileStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub backup_id: String,
    pub profile: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub files_count: usize,
    pub files: Vec<FileRecord>,
}

impl SnapshotMetadata {
    pub fn new(backup_id: &str, profile: &str, files_count: usize) -> Self {
        Self {
            backup_id: backup_id.to_string(),
            profile: profile.to_string(),
            created_at: Utc::now(),
            host: hostname::get().ok().and_then(|h| h.into_string().ok()),
            files_count,
            files: Vec::with_capacity(files_count),
        }
    }

    pub fn stored_count(&self) -> usize {
        self.files.iter().filter(|f| f.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.files.len() - self.stored_count()
    }

    /// Total bytes of stored files
    pub fn stored_bytes(&self) -> u64 {
        self.files
            .iter()
            .filter(|f| f.is_success())
            .map(|f| f.size)
            .sum()
    }

    /// Parse metadata bytes; `origin` names the file or archive for error context
    pub fn from_slice(bytes: &[u8], origin: &Path) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| BackupError::corrupt(origin, e))
    }

    pub fn read_from(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| BackupError::corrupt(path, e))?;
        Self::from_slice(&bytes, path)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// On-disk form of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    Loose,
    Archived,
}

impl Layout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Loose => "loose",
            Layout::Archived => "archived",
        }
    }
}

/// One line of a snapshot listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub run_id: String,
    pub profile: String,
    pub created_at: DateTime<Utc>,
    pub layout: Layout,
    pub files_stored: usize,
    pub files_failed: usize,
    pub location: PathBuf,
}

impl SnapshotSummary {
    pub fn new(run_id: String, metadata: &SnapshotMetadata, layout: Layout, location: PathBuf) -> Self {
        Self {
            run_id,
            profile: metadata.profile.clone(),
            created_at: metadata.created_at,
            layout,
            files_stored: metadata.stored_count(),
            files_failed: metadata.failed_count(),
            location,
        }
    }
}

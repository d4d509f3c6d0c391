//! Backup tiers and the capability interface the dispatcher drives.
//!
//! - `remote_primary`: general-purpose object storage ([`object_store`])
//! - `remote_sensitive`: privacy-focused remote sync ([`privacy_sync`])
//! - `local_airgapped`: local snapshots on an air-gapped volume ([`local`])

pub mod local;
pub mod object_store;
pub mod privacy_sync;

use crate::utils::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub use local::LocalTier;
pub use object_store::ObjectStorageTier;
pub use privacy_sync::PrivacySyncTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierName {
    RemotePrimary,
    RemoteSensitive,
    LocalAirgapped,
}

impl TierName {
    /// Every tier, in dispatch order
    pub const ALL: [TierName; 3] = [
        TierName::RemotePrimary,
        TierName::RemoteSensitive,
        TierName::LocalAirgapped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TierName::RemotePrimary => "remote_primary",
            TierName::RemoteSensitive => "remote_sensitive",
            TierName::LocalAirgapped => "local_airgapped",
        }
    }
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a tier did with the files it was handed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierReport {
    pub files_stored: usize,
    pub files_failed: usize,
    /// The tier is disabled and did nothing
    pub skipped: bool,
}

impl TierReport {
    pub fn stored(files_stored: usize) -> Self {
        Self {
            files_stored,
            ..Self::default()
        }
    }

    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// A backup destination.
///
/// Disabled tiers succeed as no-ops for both directions.
#[async_trait]
pub trait BackupTier: Send + Sync {
    fn name(&self) -> TierName;

    fn is_enabled(&self) -> bool;

    /// Store `files` for the given run
    async fn backup_files(&self, run_id: &str, files: &[PathBuf], profile: &str)
        -> Result<TierReport>;

    /// Bring back the files of a run into `target`; returns how many were restored
    async fn restore_files(&self, run_id: &str, target: &Path) -> Result<usize>;
}

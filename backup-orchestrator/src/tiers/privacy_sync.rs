//! Privacy-focused remote sync tier for sensitive files.
//!
//! Placeholder transport. Before "syncing", every file must still exist and be
//! a regular file; one that is not fails the whole tier.

use super::{BackupTier, TierName, TierReport};
use crate::config::RemoteTierConfig;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone)]
pub struct PrivacySyncTier {
    config: RemoteTierConfig,
}

impl PrivacySyncTier {
    pub fn new(config: RemoteTierConfig) -> Self {
        if !config.enabled {
            info!("Privacy sync tier is disabled in configuration");
        }
        Self { config }
    }
}

#[async_trait]
impl BackupTier for PrivacySyncTier {
    fn name(&self) -> TierName {
        TierName::RemoteSensitive
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn backup_files(
        &self,
        run_id: &str,
        files: &[PathBuf],
        _profile: &str,
    ) -> Result<TierReport> {
        if !self.config.enabled {
            info!(tier = %self.name(), "Sync skipped for {} files (disabled)", files.len());
            return Ok(TierReport::skipped());
        }

        info!(tier = %self.name(), run_id = %run_id, "Syncing {} sensitive files", files.len());

        for file in files {
            let metadata = tokio::fs::metadata(file).await.map_err(|e| {
                error!(tier = %self.name(), path = %file.display(), "Sync failed: {}", e);
                BackupError::FileAccess {
                    path: file.clone(),
                    reason: e.to_string(),
                }
            })?;

            if !metadata.is_file() {
                error!(tier = %self.name(), path = %file.display(), "Sync failed: not a regular file");
                return Err(BackupError::FileAccess {
                    path: file.clone(),
                    reason: "not a regular file".to_string(),
                });
            }

            debug!("Would sync {}", file.display());
        }

        Ok(TierReport::stored(files.len()))
    }

    async fn restore_files(&self, run_id: &str, target: &Path) -> Result<usize> {
        if !self.config.enabled {
            info!(tier = %self.name(), "Download skipped (disabled)");
            return Ok(0);
        }

        info!(tier = %self.name(), "Downloading {} into {}", run_id, target.display());
        tokio::fs::create_dir_all(target).await?;
        Ok(0)
    }
}

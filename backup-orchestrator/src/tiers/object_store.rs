//! General-purpose remote object storage tier.
//!
//! No transfer protocol is wired in yet: an enabled tier walks the file list
//! and logs each object it would upload.

use super::{BackupTier, TierName, TierReport};
use crate::config::RemoteTierConfig;
use crate::utils::errors::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ObjectStorageTier {
    config: RemoteTierConfig,
}

impl ObjectStorageTier {
    pub fn new(config: RemoteTierConfig) -> Self {
        if !config.enabled {
            info!("Object storage tier is disabled in configuration");
        }
        Self { config }
    }

    fn target(&self) -> &str {
        self.config.target.as_deref().unwrap_or("default")
    }
}

#[async_trait]
impl BackupTier for ObjectStorageTier {
    fn name(&self) -> TierName {
        TierName::RemotePrimary
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
            info!(tier = %self.name(), "Upload skipped for {} files (disabled)", files.len());
            return Ok(TierReport::skipped());
        }

        info!(tier = %self.name(), run_id = %run_id, "Uploading {} files to {}", files.len(), self.target());
        for file in files {
            debug!("Would upload {} to {}/{}", file.display(), self.target(), run_id);
        }

        Ok(TierReport::stored(files.len()))
    }

    async fn restore_files(&self, run_id: &str, target: &Path) -> Result<usize> {
        if self.config.enabled {
            info!(
                tier = %self.name(),
                "Would download {} from {} into {}",
                run_id,
                self.target(),
                target.display()
            );
        }
        Ok(0)
    }
}

//! Local air-gapped tier backed by the [`SnapshotStore`].
//!
//! One backup is: snapshot, then compress when enabled, then sweep expired
//! snapshots when a retention window is set.

use super::{BackupTier, TierName, TierReport};
use crate::config::LocalTierConfig;
use crate::snapshot::{RetentionSweeper, SnapshotStore};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct LocalTier {
    config: LocalTierConfig,
    store: Arc<SnapshotStore>,
}

impl LocalTier {
    pub fn new(config: LocalTierConfig) -> Self {
        let store = Arc::new(SnapshotStore::new(config.backup_directory.clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: LocalTierConfig, store: Arc<SnapshotStore>) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    fn run_blocking(
        &self,
        run_id: &str,
        files: &[PathBuf],
        profile: &str,
    ) -> Result<TierReport> {
        let outcome = self.store.create_snapshot(run_id, profile, files)?;
        let stored = outcome.metadata.stored_count();
        let failed = outcome.metadata.failed_count();

        if !outcome.success {
            return Err(BackupError::SnapshotEmpty {
                run_id: run_id.to_string(),
                failed,
            });
        }

        if self.config.compression {
            self.store
                .compress_snapshot(run_id, self.config.remove_loose_after_compress)?;
        }

        if let Some(days) = self.config.retention_days {
            let sweeper = RetentionSweeper::new(self.store.root(), days).protect(run_id);
            if let Err(e) = sweeper.sweep() {
                warn!(run_id = %run_id, "Retention sweep failed: {}", e);
            }
        }

        Ok(TierReport {
            files_stored: stored,
            files_failed: failed,
            skipped: false,
        })
    }
}

#[async_trait]
impl BackupTier for LocalTier {
    fn name(&self) -> TierName {
        TierName::LocalAirgapped
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn backup_files(
        &self,
        run_id: &str,
        files: &[PathBuf],
        profile: &str,
    ) -> Result<TierReport> {
        if !self.config.enabled {
            info!(tier = %self.name(), "Local backup skipped for {} files (disabled)", files.len());
            return Ok(TierReport::skipped());
        }

        let tier = self.clone();
        let run_id = run_id.to_string();
        let files = files.to_vec();
        let profile = profile.to_string();

        task::spawn_blocking(move || tier.run_blocking(&run_id, &files, &profile))
            .await
            .map_err(|e| BackupError::Tier {
                tier: TierName::LocalAirgapped,
                reason: e.to_string(),
            })?
    }

    async fn restore_files(&self, run_id: &str, target: &Path) -> Result<usize> {
        if !self.config.enabled {
            info!(tier = %self.name(), "Local restore skipped (disabled)");
            return Ok(0);
        }

        let store = Arc::clone(&self.store);
        let run_id = run_id.to_string();
        let target = target.to_path_buf();

        let outcome = task::spawn_blocking(move || store.restore_snapshot(&run_id, &target))
            .await
            .map_err(|e| BackupError::Tier {
                tier: TierName::LocalAirgapped,
                reason: e.to_string(),
            })??;

        if !outcome.is_success() {
            return Err(BackupError::Tier {
                tier: TierName::LocalAirgapped,
                reason: format!("no files restored ({} failed)", outcome.failed),
            });
        }
        Ok(outcome.restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::metadata::{SnapshotMetadata, METADATA_FILE};
    use chrono::{Duration, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn config(root: &Path, compression: bool, retention_days: Option<u32>) -> LocalTierConfig {
        LocalTierConfig {
            enabled: true,
            backup_directory: root.to_path_buf(),
            compression,
            remove_loose_after_compress: true,
            retention_days,
        }
    }

    #[tokio::test]
    async fn test_backup_and_restore_loose() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("notes.txt");
        fs::write(&file, b"hello")?;
        let tier = LocalTier::new(config(&temp.path().join("backups"), false, None));

        let report = tier
            .backup_files("backup-1", &[file, temp.path().join("gone.txt")], "docs")
            .await?;
        assert_eq!(report.files_stored, 1);
        assert_eq!(report.files_failed, 1);

        let restored = tier.restore_files("backup-1", &temp.path().join("out")).await?;
        assert_eq!(restored, 1);
        assert_eq!(fs::read(temp.path().join("out/notes.txt"))?, b"hello");
        Ok(())
    }

    #[tokio::test]
    async fn test_compression_replaces_loose_snapshot() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("notes.txt");
        fs::write(&file, b"hello")?;
        let tier = LocalTier::new(config(&temp.path().join("backups"), true, None));

        tier.backup_files("backup-1", &[file], "docs").await?;

        assert!(tier.store().archive_path("backup-1").is_file());
        assert!(!tier.store().snapshot_dir("backup-1").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_nothing_stored_is_snapshot_empty() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tier = LocalTier::new(config(&temp.path().join("backups"), true, None));

        let err = tier
            .backup_files("backup-1", &[temp.path().join("gone.txt")], "docs")
            .await
            .unwrap_err();

        assert!(matches!(err, BackupError::SnapshotEmpty { failed: 1, .. }));
        assert_eq!(err.failed_file_count(), 1);
        assert!(!tier.store().archive_path("backup-1").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_backup_sweeps_expired_but_not_current() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let file = temp.path().join("notes.txt");
        fs::write(&file, b"hello")?;
        let tier = LocalTier::new(config(&temp.path().join("backups"), false, Some(7)));

        tier.backup_files("backup-old", &[file.clone()], "docs").await?;
        let path = tier.store().snapshot_dir("backup-old").join(METADATA_FILE);
        let mut metadata = SnapshotMetadata::read_from(&path)?;
        metadata.created_at = Utc::now() - Duration::days(30);
        metadata.write_to(&path)?;

        tier.backup_files("backup-new", &[file], "docs").await?;

        assert!(!tier.store().snapshot_dir("backup-old").exists());
        assert!(tier.store().snapshot_dir("backup-new").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_restore_unknown_run() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let tier = LocalTier::new(config(&temp.path().join("backups"), false, None));

        let err = tier
            .restore_files("backup-404", &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::SnapshotNotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_tier_is_noop() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut cfg = config(&temp.path().join("backups"), false, None);
        cfg.enabled = false;
        let tier = LocalTier::new(cfg);

        let report = tier
            .backup_files("backup-1", &[temp.path().join("gone.txt")], "docs")
            .await?;
        assert!(report.skipped);
        assert!(!temp.path().join("backups").exists());
        Ok(())
    }
}

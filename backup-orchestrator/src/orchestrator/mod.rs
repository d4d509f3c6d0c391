//! Orchestration of one backup run: discover, classify, dispatch, summarize.

pub mod run;

use crate::classifier::Classifier;
use crate::config::Config;
use crate::dispatch::TierDispatcher;
use crate::fs::discover_files;
use crate::snapshot::{SnapshotStore, SnapshotSummary};
use crate::tiers::TierName;
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::format_duration;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tracing::{info, info_span, warn, Instrument};

pub use run::{generate_run_id, BackupRun, RunSummary};

pub struct Orchestrator {
    config: Config,
    classifier: Classifier,
    dispatcher: TierDispatcher,
    store: Arc<SnapshotStore>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(SnapshotStore::new(config.local.backup_directory.clone()));
        let dispatcher = TierDispatcher::from_config(&config, Arc::clone(&store));
        Self::with_dispatcher(config, dispatcher, store)
    }

    /// Build with a custom set of tier backends.
    ///
    /// `store` is the snapshot store the local tier writes to; listing reads it directly.
    pub fn with_dispatcher(
        config: Config,
        dispatcher: TierDispatcher,
        store: Arc<SnapshotStore>,
    ) -> Result<Self> {
        let classifier = Classifier::new(&config.classification)?;
        Ok(Self {
            config,
            classifier,
            dispatcher,
            store,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Back up one profile.
    ///
    /// Only an unknown profile or a failed discovery are returned as errors;
    /// tier failures end up in [`BackupRun::success`].
    pub async fn run_profile(&self, profile_name: &str) -> Result<BackupRun> {
        let profile = self.config.profile(profile_name)?;
        let mut run = BackupRun::start(profile_name);
        let span = info_span!("backup_run", run_id = %run.run_id, profile = %profile_name);

        async {
            info!(
                "Starting backup of profile '{}'",
                profile.name.as_deref().unwrap_or(profile_name)
            );

            let sources = profile.paths.clone();
            let files = task::spawn_blocking(move || discover_files(&sources))
                .await
                .map_err(|e| BackupError::Io(io::Error::other(e)))??;
            run.files_processed = files.len();

            if files.is_empty() {
                info!("No files found to back up");
                run.finish(true);
            } else {
                info!("Discovered {} files", files.len());
                let assignment = self.classifier.classify(&files);
                let report = self
                    .dispatcher
                    .dispatch(&run.run_id, &assignment, profile_name)
                    .await;
                run.record(&report);
                run.finish(report.success());
            }

            self.persist_summary(&run);
            info!(
                "Backup finished in {}: success={}, tiers completed={:?}",
                format_duration(run.duration_seconds()),
                run.success,
                run.tiers_completed
            );
            Ok::<_, BackupError>(run)
        }
        .instrument(span)
        .await
    }

    fn persist_summary(&self, run: &BackupRun) {
        match run.summary().write_to(&self.config.summary_directory) {
            Ok(path) => info!("Run summary written to {}", path.display()),
            Err(e) => warn!("Failed to write run summary: {}", e),
        }
    }

    /// Restore a local snapshot into `target` through the local tier; returns files restored
    pub async fn restore(&self, run_id: &str, target: &Path) -> Result<usize> {
        let tier = TierName::LocalAirgapped;
        let backend = self.dispatcher.tier(tier).ok_or_else(|| BackupError::Tier {
            tier,
            reason: "no backend registered".to_string(),
        })?;

        if !backend.is_enabled() {
            return Err(BackupError::Tier {
                tier,
                reason: "tier is disabled, nothing to restore".to_string(),
            });
        }

        let restored = backend.restore_files(run_id, target).await?;
        info!(run_id = %run_id, "Restored {} files to {}", restored, target.display());
        Ok(restored)
    }

    /// Local snapshots, newest first
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        let store = Arc::clone(&self.store);
        task::spawn_blocking(move || store.list_snapshots())
            .await
            .map_err(|e| BackupError::Io(io::Error::other(e)))?
    }
}

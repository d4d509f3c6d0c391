//! Tier dispatch.
//!
//! Every non-empty tier assignment is handed to its backend on its own task.
//! Results are joined in the fixed tier order so reports are deterministic no
//! matter which tier finishes first. One tier failing never cancels the others.

use crate::classifier::TierAssignment;
use crate::config::Config;
use crate::snapshot::SnapshotStore;
use crate::tiers::{BackupTier, LocalTier, ObjectStorageTier, PrivacySyncTier, TierName, TierReport};
use crate::utils::errors::{BackupError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, Instrument, Span};

/// Outcome of one tier within a run
#[derive(Debug)]
pub struct TierOutcome {
    pub tier: TierName,
    pub result: Result<TierReport>,
}

impl TierOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Files this tier attempted but did not store
    pub fn files_failed(&self) -> usize {
        match &self.result {
            Ok(report) => report.files_failed,
            Err(e) => e.failed_file_count(),
        }
    }
}

/// Per-tier outcomes of one dispatch, in tier order
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<TierOutcome>,
}

impl DispatchReport {
    /// Logical AND over invoked tiers; false when no tier was invoked
    pub fn success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(TierOutcome::is_success)
    }

    pub fn completed_tiers(&self) -> Vec<TierName> {
        self.outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.tier)
            .collect()
    }

    pub fn files_failed(&self) -> usize {
        self.outcomes.iter().map(TierOutcome::files_failed).sum()
    }
}

/// Registry of tier backends
#[derive(Clone, Default)]
pub struct TierDispatcher {
    tiers: BTreeMap<TierName, Arc<dyn BackupTier>>,
}

impl TierDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// All three backends built from configuration; the local tier writes to `store`
    pub fn from_config(config: &Config, store: Arc<SnapshotStore>) -> Self {
        Self::new()
            .with_tier(Arc::new(ObjectStorageTier::new(config.remote_primary.clone())))
            .with_tier(Arc::new(PrivacySyncTier::new(config.remote_sensitive.clone())))
            .with_tier(Arc::new(LocalTier::with_store(config.local.clone(), store)))
    }

    pub fn with_tier(mut self, tier: Arc<dyn BackupTier>) -> Self {
        self.register(tier);
        self
    }

    /// Register a backend under its own name, replacing any previous one
    pub fn register(&mut self, tier: Arc<dyn BackupTier>) {
        self.tiers.insert(tier.name(), tier);
    }

    pub fn tier(&self, name: TierName) -> Option<&Arc<dyn BackupTier>> {
        self.tiers.get(&name)
    }

    pub async fn dispatch(&self, run_id: &str, assignment: &TierAssignment, profile: &str) -> DispatchReport {
        let mut pending = Vec::new();

        for (name, files) in assignment.non_empty() {
            let Some(tier) = self.tiers.get(&name).cloned() else {
                error!(tier = %name, "No backend registered for tier");
                pending.push((name, None));
                continue;
            };

            info!(tier = %name, "Dispatching {} files", files.len());
            let run_id = run_id.to_string();
            let files = files.to_vec();
            let profile = profile.to_string();

            let handle = tokio::spawn(
                async move { tier.backup_files(&run_id, &files, &profile).await }
                    .instrument(Span::current()),
            );
            pending.push((name, Some(handle)));
        }

        let mut report = DispatchReport::default();
        for (tier, handle) in pending {
            let result = match handle {
                None => Err(BackupError::Tier {
                    tier,
                    reason: "no backend registered".to_string(),
                }),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(BackupError::Tier {
                        tier,
                        reason: format!("task failed: {}", e),
                    }),
                },
            };

            match &result {
                Ok(tier_report) if tier_report.skipped => info!(tier = %tier, "Tier disabled, skipped"),
                Ok(tier_report) => info!(
                    tier = %tier,
                    "Tier completed: {} stored, {} failed",
                    tier_report.files_stored, tier_report.files_failed
                ),
                Err(e) => error!(tier = %tier, "Tier failed: {}", e),
            }

            report.outcomes.push(TierOutcome { tier, result });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted tier for dispatch tests
    struct MockTier {
        name: TierName,
        fail: bool,
        calls: AtomicUsize,
    }

    impl MockTier {
        fn new(name: TierName, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl BackupTier for MockTier {
        fn name(&self) -> TierName {
            self.name
        }

        fn is_enabled(&self) -> bool {
            true
        }

        async fn backup_files(&self, _run_id: &str, files: &[PathBuf], _profile: &str) -> Result<TierReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(BackupError::Tier {
                    tier: self.name,
                    reason: "scripted failure".to_string(),
                })
            } else {
                Ok(TierReport::stored(files.len()))
            }
        }

        async fn restore_files(&self, _run_id: &str, _target: &Path) -> Result<usize> {
            Ok(0)
        }
    }

    fn assignment(primary: &[&str], sensitive: &[&str], local: &[&str]) -> TierAssignment {
        let paths = |names: &[&str]| -> Vec<PathBuf> { names.iter().map(PathBuf::from).collect() };
        TierAssignment {
            remote_primary: paths(primary),
            remote_sensitive: paths(sensitive),
            local_airgapped: paths(local),
        }
    }

    #[tokio::test]
    async fn test_all_tiers_succeed() {
        let dispatcher = TierDispatcher::new()
            .with_tier(MockTier::new(TierName::RemotePrimary, false))
            .with_tier(MockTier::new(TierName::RemoteSensitive, false))
            .with_tier(MockTier::new(TierName::LocalAirgapped, false));

        let report = dispatcher
            .dispatch("backup-1", &assignment(&["a"], &["b.key"], &["a"]), "docs")
            .await;

        assert!(report.success());
        assert_eq!(report.completed_tiers(), TierName::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_one_failure_fails_run_but_not_siblings() {
        let primary = MockTier::new(TierName::RemotePrimary, true);
        let local = MockTier::new(TierName::LocalAirgapped, false);
        let dispatcher = TierDispatcher::new()
            .with_tier(primary.clone())
            .with_tier(MockTier::new(TierName::RemoteSensitive, false))
            .with_tier(local.clone());

        let report = dispatcher
            .dispatch("backup-1", &assignment(&["a"], &[], &["a"]), "docs")
            .await;

        assert!(!report.success());
        assert_eq!(report.completed_tiers(), vec![TierName::LocalAirgapped]);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_tiers_are_not_invoked() {
        let sensitive = MockTier::new(TierName::RemoteSensitive, false);
        let dispatcher = TierDispatcher::new()
            .with_tier(MockTier::new(TierName::RemotePrimary, false))
            .with_tier(sensitive.clone());

        let report = dispatcher
            .dispatch("backup-1", &assignment(&["a"], &[], &[]), "docs")
            .await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(sensitive.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_tier_invoked_is_not_success() {
        let dispatcher = TierDispatcher::new().with_tier(MockTier::new(TierName::RemotePrimary, false));
        let report = dispatcher
            .dispatch("backup-1", &TierAssignment::default(), "docs")
            .await;

        assert!(report.outcomes.is_empty());
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_missing_backend_counts_as_failure() {
        let dispatcher = TierDispatcher::new().with_tier(MockTier::new(TierName::RemotePrimary, false));
        let report = dispatcher
            .dispatch("backup-1", &assignment(&["a"], &["b.key"], &[]), "docs")
            .await;

        assert!(!report.success());
        assert_eq!(report.completed_tiers(), vec![TierName::RemotePrimary]);
        assert!(matches!(
            report.outcomes[1].result,
            Err(BackupError::Tier { tier: TierName::RemoteSensitive, .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_file_counts_are_summed() {
        let dispatcher = TierDispatcher::new();
        let mut report = dispatcher
            .dispatch("backup-1", &TierAssignment::default(), "docs")
            .await;
        report.outcomes.push(TierOutcome {
            tier: TierName::RemotePrimary,
            result: Ok(TierReport {
                files_stored: 2,
                files_failed: 1,
                skipped: false,
            }),
        });
        report.outcomes.push(TierOutcome {
            tier: TierName::LocalAirgapped,
            result: Err(BackupError::SnapshotEmpty {
                run_id: "backup-1".to_string(),
                failed: 3,
            }),
        });

        assert_eq!(report.files_failed(), 4);
    }
}

//! Age-based deletion of old snapshots.

use super::{scan, StoredEntry};
use crate::fs::metadata::FileMetadata;
use crate::utils::errors::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Run ids (or orphan archive stems) that were deleted
    pub removed: Vec<String>,
    pub kept: usize,
    /// Entries left alone because their metadata could not be read or deletion failed
    pub skipped: usize,
}

/// Deletes snapshots whose creation time is older than the retention window.
///
/// Loose directories with unreadable metadata are never deleted. Archives with
/// unreadable metadata are treated as orphans and aged by their file mtime.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    root: PathBuf,
    retention_days: u32,
    protected: HashSet<String>,
}

impl RetentionSweeper {
    pub fn new(root: impl Into<PathBuf>, retention_days: u32) -> Self {
        Self {
            root: root.into(),
            retention_days,
            protected: HashSet::new(),
        }
    }

    /// Never sweep `run_id`, whatever its age
    pub fn protect(mut self, run_id: impl Into<String>) -> Self {
        self.protected.insert(run_id.into());
        self
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(i64::from(self.retention_days))
    }

    pub fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let cutoff = self.cutoff(now);
        let mut report = SweepReport::default();

        debug!(
            "Sweeping {} (retention {} days, cutoff {})",
            self.root.display(),
            self.retention_days,
            cutoff.to_rfc3339()
        );

        for entry in scan(&self.root)? {
            if self.protected.contains(entry.run_id()) {
                report.kept += 1;
                continue;
            }

            let created_at = match (entry.read_metadata(), &entry) {
                (Ok(metadata), _) => metadata.created_at,
                (Err(e), StoredEntry::Loose { dir, .. }) => {
                    warn!("Keeping snapshot {} with unreadable metadata: {}", dir.display(), e);
                    report.skipped += 1;
                    continue;
                }
                (Err(e), StoredEntry::Archive { archive, .. }) => {
                    match FileMetadata::from_path(archive) {
                        Ok(file) => {
                            debug!("Orphan archive {} ({}), aging by mtime", archive.display(), e);
                            file.modified
                        }
                        Err(stat_err) => {
                            warn!("Cannot stat orphan archive {}: {}", archive.display(), stat_err);
                            report.skipped += 1;
                            continue;
                        }
                    }
                }
            };

            if created_at >= cutoff {
                report.kept += 1;
                continue;
            }

            match remove_entry(&entry) {
                Ok(()) => {
                    info!(
                        run_id = %entry.run_id(),
                        "Removed expired snapshot {} (created {})",
                        entry.path().display(),
                        created_at.to_rfc3339()
                    );
                    report.removed.push(entry.run_id().to_string());
                }
                Err(e) => {
                    warn!("Failed to remove expired snapshot {}: {}", entry.path().display(), e);
                    report.skipped += 1;
                }
            }
        }

        info!(
            "Retention sweep finished: {} removed, {} kept, {} skipped",
            report.removed.len(),
            report.kept,
            report.skipped
        );
        Ok(report)
    }
}

fn remove_entry(entry: &StoredEntry) -> std::io::Result<()> {
    match entry {
        StoredEntry::Loose { dir, .. } => fs::remove_dir_all(dir),
        StoredEntry::Archive { archive, .. } => fs::remove_file(archive),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::metadata::{SnapshotMetadata, METADATA_FILE};
    use crate::snapshot::SnapshotStore;
    use std::path::Path;
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        "2026-06-01T12:00:00Z".parse().unwrap()
    }

    /// Create a loose snapshot and backdate its metadata by `age_days`
    fn snapshot_aged(store: &SnapshotStore, source: &Path, run_id: &str, age_days: i64) {
        store
            .create_snapshot(run_id, "docs", &[source.to_path_buf()])
            .unwrap();
        let path = store.snapshot_dir(run_id).join(METADATA_FILE);
        let mut metadata = SnapshotMetadata::read_from(&path).unwrap();
        metadata.created_at = now() - Duration::days(age_days);
        metadata.write_to(&path).unwrap();
    }

    fn setup() -> std::io::Result<(TempDir, SnapshotStore, PathBuf)> {
        let temp = TempDir::new()?;
        let source = temp.path().join("a.txt");
        fs::write(&source, b"alpha")?;
        let store = SnapshotStore::new(temp.path().join("backups"));
        Ok((temp, store, source))
    }

    #[test]
    fn test_old_snapshot_removed_new_kept() -> std::io::Result<()> {
        let (_temp, store, source) = setup()?;
        snapshot_aged(&store, &source, "backup-old", 31);
        snapshot_aged(&store, &source, "backup-new", 29);

        let report = RetentionSweeper::new(store.root(), 30).sweep_at(now()).unwrap();

        assert_eq!(report.removed, vec!["backup-old"]);
        assert_eq!(report.kept, 1);
        assert!(!store.snapshot_dir("backup-old").exists());
        assert!(store.snapshot_dir("backup-new").exists());
        Ok(())
    }

    #[test]
    fn test_snapshot_exactly_at_cutoff_is_kept() -> std::io::Result<()> {
        let (_temp, store, source) = setup()?;
        snapshot_aged(&store, &source, "backup-edge", 30);

        let report = RetentionSweeper::new(store.root(), 30).sweep_at(now()).unwrap();
        assert!(report.removed.is_empty());
        assert!(store.snapshot_dir("backup-edge").exists());
        Ok(())
    }

    #[test]
    fn test_old_archive_removed() -> std::io::Result<()> {
        let (_temp, store, source) = setup()?;
        snapshot_aged(&store, &source, "backup-old", 90);
        store.compress_snapshot("backup-old", true).unwrap();

        let report = RetentionSweeper::new(store.root(), 30).sweep_at(now()).unwrap();

        assert_eq!(report.removed, vec!["backup-old"]);
        assert!(!store.archive_path("backup-old").exists());
        Ok(())
    }

    #[test]
    fn test_orphan_archive_aged_by_mtime() -> std::io::Result<()> {
        let (_temp, store, _source) = setup()?;
        fs::create_dir_all(store.root())?;
        let stale = store.archive_path("backup-stale");
        let fresh = store.archive_path("backup-fresh");
        fs::write(&stale, b"no metadata here")?;
        fs::write(&fresh, b"no metadata here either")?;

        let long_ago = SystemTime::now() - StdDuration::from_secs(400 * 24 * 3600);
        fs::File::options()
            .write(true)
            .open(&stale)?
            .set_modified(long_ago)?;

        let report = RetentionSweeper::new(store.root(), 30).sweep().unwrap();

        assert_eq!(report.removed, vec!["backup-stale"]);
        assert!(!stale.exists());
        assert!(fresh.exists());
        Ok(())
    }

    #[test]
    fn test_corrupt_loose_snapshot_is_never_deleted() -> std::io::Result<()> {
        let (_temp, store, _source) = setup()?;
        let broken = store.snapshot_dir("backup-broken");
        fs::create_dir_all(&broken)?;
        fs::write(broken.join(METADATA_FILE), b"not json")?;

        let report = RetentionSweeper::new(store.root(), 1)
            .sweep_at(now() + Duration::days(3650))
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert!(broken.exists());
        Ok(())
    }

    #[test]
    fn test_protected_run_is_kept() -> std::io::Result<()> {
        let (_temp, store, source) = setup()?;
        snapshot_aged(&store, &source, "backup-current", 365);

        let report = RetentionSweeper::new(store.root(), 7)
            .protect("backup-current")
            .sweep_at(now())
            .unwrap();

        assert!(report.removed.is_empty());
        assert!(store.snapshot_dir("backup-current").exists());
        Ok(())
    }

    #[test]
    fn test_missing_root_is_a_no_op() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let report = RetentionSweeper::new(temp.path().join("nope"), 7)
            .sweep()
            .unwrap();
        assert_eq!(report, SweepReport::default());
        Ok(())
    }
}

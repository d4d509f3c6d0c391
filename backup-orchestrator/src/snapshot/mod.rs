//! Local snapshot store.
//!
//! The backup root holds one entry per run:
//!
//! ```text
//! <root>/<run-id>/                 loose layout: copied files + backup-metadata.json
//! <root>/<run-id>.zip              archived layout: same tree, deflate-compressed
//! ```
//!
//! A snapshot moves from loose to archived once, through [`SnapshotStore::compress_snapshot`].
//! When both forms of a run exist (loose directory kept after compression) the
//! archive is authoritative for listing and restore.

pub mod archive;
pub mod metadata;
pub mod restore;
pub mod retention;

use crate::fs::metadata::FileMetadata;
use crate::utils::errors::{BackupError, Result};
use crate::utils::format::format_bytes;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

pub use archive::CompressionStats;
pub use metadata::{FileRecord, FileStatus, Layout, SnapshotMetadata, SnapshotSummary, METADATA_FILE};
pub use restore::{RestoreOutcome, RestoreStrategy};
pub use retention::{RetentionSweeper, SweepReport};

/// Result of [`SnapshotStore::create_snapshot`]
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    /// At least one file was stored
    pub success: bool,
    pub metadata: SnapshotMetadata,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    pub fn archive_path(&self, run_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", run_id, archive::ARCHIVE_EXTENSION))
    }

    /// Copy `files` into a new loose snapshot, recording one [`FileRecord`] per file.
    ///
    /// Per-file problems become failed records; only errors on the snapshot
    /// directory or the metadata file itself are returned.
    pub fn create_snapshot(
        &self,
        run_id: &str,
        profile: &str,
        files: &[PathBuf],
    ) -> Result<SnapshotOutcome> {
        validate_run_id(run_id)?;
        let snapshot_dir = self.snapshot_dir(run_id);
        fs::create_dir_all(&snapshot_dir)?;

        info!(
            run_id = %run_id,
            "Creating snapshot of {} files in {}",
            files.len(),
            snapshot_dir.display()
        );

        let mut metadata = SnapshotMetadata::new(run_id, profile, files.len());

        for source in files {
            let destination = snapshot_dir.join(relativize(source));
            let record = match copy_file(source, &destination) {
                Ok(size) => {
                    debug!("Stored {} ({})", source.display(), format_bytes(size));
                    FileRecord::stored(source.clone(), destination, size)
                }
                Err(e) => {
                    warn!(run_id = %run_id, path = %source.display(), "Failed to store file: {}", e);
                    FileRecord::failed(source.clone(), error_type(&e), e.to_string())
                }
            };
            metadata.files.push(record);
        }

        metadata.write_to(&snapshot_dir.join(METADATA_FILE))?;

        let stored = metadata.stored_count();
        info!(
            run_id = %run_id,
            "Snapshot created: {}/{} files stored ({})",
            stored,
            files.len(),
            format_bytes(metadata.stored_bytes())
        );

        Ok(SnapshotOutcome {
            success: stored > 0,
            metadata,
        })
    }

    /// Pack a loose snapshot into `<run-id>.zip`, optionally removing the directory afterwards
    pub fn compress_snapshot(&self, run_id: &str, remove_loose: bool) -> Result<CompressionStats> {
        validate_run_id(run_id)?;
        let snapshot_dir = self.snapshot_dir(run_id);
        if !snapshot_dir.is_dir() {
            return Err(BackupError::SnapshotNotFound(run_id.to_string()));
        }

        let archive_path = self.archive_path(run_id);
        let stats = archive::pack_directory(&snapshot_dir, &archive_path)?;

        info!(
            run_id = %run_id,
            "Compressed snapshot: {} -> {} ({:.1}% saved)",
            format_bytes(stats.original_size),
            format_bytes(stats.compressed_size),
            stats.ratio_percent()
        );

        if remove_loose {
            if let Err(e) = fs::remove_dir_all(&snapshot_dir) {
                warn!(
                    run_id = %run_id,
                    "Archive written but loose snapshot could not be removed: {}", e
                );
            }
        }

        Ok(stats)
    }

    /// Find how a run is stored; the archive wins over a loose directory
    pub fn locate(&self, run_id: &str) -> Option<RestoreStrategy> {
        validate_run_id(run_id).ok()?;

        let archive = self.archive_path(run_id);
        if archive::is_archive(&archive) {
            return Some(RestoreStrategy::Archive { archive });
        }

        let snapshot_dir = self.snapshot_dir(run_id);
        if snapshot_dir.is_dir() {
            return Some(RestoreStrategy::Loose { snapshot_dir });
        }

        None
    }

    /// Restore a run into `target`. Nothing is written when the run is unknown.
    pub fn restore_snapshot(&self, run_id: &str, target: &Path) -> Result<RestoreOutcome> {
        let strategy = self
            .locate(run_id)
            .ok_or_else(|| BackupError::SnapshotNotFound(run_id.to_string()))?;

        info!(
            run_id = %run_id,
            "Restoring {:?} snapshot to {}",
            strategy.layout(),
            target.display()
        );
        strategy.restore(target)
    }

    /// Summaries of every readable snapshot, newest first.
    ///
    /// Snapshots with unreadable metadata are logged and left out.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        let mut by_run: BTreeMap<String, SnapshotSummary> = BTreeMap::new();

        for entry in scan(&self.root)? {
            let metadata = match entry.read_metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!("Skipping snapshot {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let summary = SnapshotSummary::new(
                entry.run_id().to_string(),
                &metadata,
                entry.layout(),
                entry.path().to_path_buf(),
            );

            let shadowed = summary.layout == Layout::Loose
                && by_run
                    .get(&summary.run_id)
                    .is_some_and(|existing| existing.layout == Layout::Archived);
            if !shadowed {
                by_run.insert(summary.run_id.clone(), summary);
            }
        }

        let mut snapshots: Vec<SnapshotSummary> = by_run.into_values().collect();
        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.run_id.cmp(&a.run_id))
        });
        Ok(snapshots)
    }
}

/// One run as found on disk, before its metadata is read
#[derive(Debug, Clone)]
pub(crate) enum StoredEntry {
    Loose { run_id: String, dir: PathBuf },
    Archive { run_id: String, archive: PathBuf },
}

impl StoredEntry {
    pub(crate) fn run_id(&self) -> &str {
        match self {
            StoredEntry::Loose { run_id, .. } | StoredEntry::Archive { run_id, .. } => run_id,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            StoredEntry::Loose { dir, .. } => dir,
            StoredEntry::Archive { archive, .. } => archive,
        }
    }

    pub(crate) fn layout(&self) -> Layout {
        match self {
            StoredEntry::Loose { .. } => Layout::Loose,
            StoredEntry::Archive { .. } => Layout::Archived,
        }
    }

    pub(crate) fn read_metadata(&self) -> Result<SnapshotMetadata> {
        match self {
            StoredEntry::Loose { dir, .. } => SnapshotMetadata::read_from(&dir.join(METADATA_FILE)),
            StoredEntry::Archive { archive, .. } => archive::read_metadata(archive),
        }
    }
}

/// Enumerate run directories and finished archives under `root`, sorted by path.
/// A missing root has no entries.
pub(crate) fn scan(root: &Path) -> Result<Vec<StoredEntry>> {
    let reader = match fs::read_dir(root) {
        Ok(reader) => reader,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for entry in reader {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        if path.is_dir() {
            entries.push(StoredEntry::Loose {
                run_id: name.to_string(),
                dir: path.clone(),
            });
        } else if archive::is_archive(&path) {
            if let Some(run_id) = path.file_stem().and_then(|s| s.to_str()) {
                entries.push(StoredEntry::Archive {
                    run_id: run_id.to_string(),
                    archive: path.clone(),
                });
            }
        }
    }

    entries.sort_by(|a, b| a.path().cmp(b.path()));
    Ok(entries)
}

/// Map an absolute source path to a relative one by dropping its root and prefix.
///
/// `/home/u/a.txt` becomes `home/u/a.txt`; `..` and `.` components are dropped
/// so the result always stays inside the snapshot directory.
pub(crate) fn relativize(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn validate_run_id(run_id: &str) -> Result<()> {
    let valid = !run_id.is_empty()
        && run_id != "."
        && run_id != ".."
        && !run_id.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(BackupError::SnapshotNotFound(run_id.to_string()))
    }
}

/// Copy one regular file, creating parent directories and keeping the source
/// modification time. Returns bytes copied.
fn copy_file(source: &Path, destination: &Path) -> io::Result<u64> {
    let metadata = FileMetadata::from_path(source)?;
    if !metadata.is_file {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a regular file: {}", source.display()),
        ));
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let copied = fs::copy(source, destination)?;
    File::options()
        .write(true)
        .open(destination)?
        .set_modified(SystemTime::from(metadata.modified))?;
    Ok(copied)
}

/// Short tag stored in a failed record's `error_type`
fn error_type(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::NotFound => "NotFound".to_string(),
        io::ErrorKind::InvalidInput => "NotAFile".to_string(),
        kind => format!("{:?}", kind),
    }
}

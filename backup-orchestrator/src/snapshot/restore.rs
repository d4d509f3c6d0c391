//! Restore strategies, one per snapshot layout.
//!
//! The two layouts restore differently:
//! - [`RestoreStrategy::Loose`] copies every stored file to `target/<file name>`,
//!   flattening the source hierarchy. Files sharing a name overwrite each other
//!   (last record wins).
//! - [`RestoreStrategy::Archive`] extracts entries under their relative paths,
//!   keeping the hierarchy.

use super::archive::sanitize_entry_name;
use super::metadata::{Layout, SnapshotMetadata, METADATA_FILE};
use super::relativize;
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::ZipArchive;

/// Result of restoring one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    pub layout: Layout,
    pub restored: usize,
    pub failed: usize,
}

impl RestoreOutcome {
    fn new(layout: Layout) -> Self {
        Self {
            layout,
            restored: 0,
            failed: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.restored > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreStrategy {
    Loose { snapshot_dir: PathBuf },
    Archive { archive: PathBuf },
}

impl RestoreStrategy {
    pub fn layout(&self) -> Layout {
        match self {
            RestoreStrategy::Loose { .. } => Layout::Loose,
            RestoreStrategy::Archive { .. } => Layout::Archived,
        }
    }

    pub fn restore(&self, target: &Path) -> Result<RestoreOutcome> {
        let outcome = match self {
            RestoreStrategy::Loose { snapshot_dir } => restore_loose(snapshot_dir, target)?,
            RestoreStrategy::Archive { archive } => restore_archive(archive, target)?,
        };

        info!(
            "Restore completed: {} files restored, {} failed ({:?})",
            outcome.restored, outcome.failed, outcome.layout
        );
        Ok(outcome)
    }
}

fn restore_loose(snapshot_dir: &Path, target: &Path) -> Result<RestoreOutcome> {
    let metadata = SnapshotMetadata::read_from(&snapshot_dir.join(METADATA_FILE))?;
    fs::create_dir_all(target)?;

    let mut outcome = RestoreOutcome::new(Layout::Loose);

    for record in metadata.files.iter().filter(|r| r.is_success()) {
        let Some(file_name) = record.source.file_name() else {
            warn!("Skipping record without a file name: {}", record.source.display());
            outcome.failed += 1;
            continue;
        };

        let stored = record
            .destination
            .clone()
            .filter(|d| d.is_file())
            .unwrap_or_else(|| snapshot_dir.join(relativize(&record.source)));
        let destination = target.join(file_name);

        match fs::copy(&stored, &destination) {
            Ok(_) => {
                debug!("Restored {} to {}", stored.display(), destination.display());
                outcome.restored += 1;
            }
            Err(e) => {
                warn!("Failed to restore {}: {}", record.source.display(), e);
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

fn restore_archive(archive: &Path, target: &Path) -> Result<RestoreOutcome> {
    let file = File::open(archive)?;
    let mut zip = ZipArchive::new(file).map_err(|e| BackupError::archive(archive, e))?;
    fs::create_dir_all(target)?;

    let mut outcome = RestoreOutcome::new(Layout::Archived);

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Unreadable entry #{} in {}: {}", index, archive.display(), e);
                outcome.failed += 1;
                continue;
            }
        };

        if entry.is_dir() || entry.name() == METADATA_FILE {
            continue;
        }

        let Some(relative) = sanitize_entry_name(entry.name()) else {
            warn!("Refusing to extract unsafe entry '{}'", entry.name());
            outcome.failed += 1;
            continue;
        };
        let destination = target.join(&relative);

        match extract_entry(&mut entry, &destination) {
            Ok(()) => {
                debug!("Extracted {}", destination.display());
                outcome.restored += 1;
            }
            Err(e) => {
                warn!("Failed to extract {}: {}", relative.display(), e);
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}

fn extract_entry(entry: &mut impl io::Read, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut output = File::create(destination)?;
    io::copy(entry, &mut output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::archive::pack_directory;
    use crate::snapshot::metadata::FileRecord;
    use tempfile::TempDir;

    /// Lay out a loose snapshot by hand: two files named `same.txt` in different directories.
    fn loose_snapshot(root: &Path) -> std::io::Result<PathBuf> {
        let dir = root.join("backup-1");
        fs::create_dir_all(dir.join("src/a"))?;
        fs::create_dir_all(dir.join("src/b"))?;
        fs::write(dir.join("src/a/same.txt"), b"from a")?;
        fs::write(dir.join("src/b/same.txt"), b"from b")?;

        let mut metadata = SnapshotMetadata::new("backup-1", "docs", 3);
        metadata.files.push(FileRecord::stored(
            "/src/a/same.txt".into(),
            dir.join("src/a/same.txt"),
            6,
        ));
        metadata.files.push(FileRecord::stored(
            "/src/b/same.txt".into(),
            dir.join("src/b/same.txt"),
            6,
        ));
        metadata
            .files
            .push(FileRecord::failed("/src/gone.txt".into(), "NotFound", "gone"));
        metadata.write_to(&dir.join(METADATA_FILE)).unwrap();
        Ok(dir)
    }

    #[test]
    fn test_loose_restore_flattens_and_last_wins() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let dir = loose_snapshot(temp.path())?;
        let target = temp.path().join("restore");

        let outcome = RestoreStrategy::Loose { snapshot_dir: dir }
            .restore(&target)
            .unwrap();

        assert_eq!(outcome.layout, Layout::Loose);
        assert_eq!(outcome.restored, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(fs::read_to_string(target.join("same.txt"))?, "from b");
        assert!(!target.join("src").exists());
        Ok(())
    }

    #[test]
    fn test_loose_restore_falls_back_when_destination_moved() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let dir = loose_snapshot(temp.path())?;
        let moved = temp.path().join("moved-root");
        fs::create_dir_all(&moved)?;
        let moved_dir = moved.join("backup-1");
        fs::rename(&dir, &moved_dir)?;

        let outcome = RestoreStrategy::Loose {
            snapshot_dir: moved_dir,
        }
        .restore(&temp.path().join("restore"))
        .unwrap();
        assert_eq!(outcome.restored, 2);
        Ok(())
    }

    #[test]
    fn test_loose_restore_without_metadata_is_corruption() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("backup-1");
        fs::create_dir_all(&dir)?;

        let err = RestoreStrategy::Loose { snapshot_dir: dir }
            .restore(&temp.path().join("restore"))
            .unwrap_err();
        assert!(matches!(err, BackupError::MetadataCorruption { .. }));
        assert!(!temp.path().join("restore").exists());
        Ok(())
    }

    #[test]
    fn test_archive_restore_keeps_structure() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let dir = loose_snapshot(temp.path())?;
        let archive = temp.path().join("backup-1.zip");
        pack_directory(&dir, &archive).unwrap();
        let target = temp.path().join("restore");

        let outcome = RestoreStrategy::Archive { archive }.restore(&target).unwrap();

        assert_eq!(outcome.layout, Layout::Archived);
        assert_eq!(outcome.restored, 2);
        assert_eq!(fs::read_to_string(target.join("src/a/same.txt"))?, "from a");
        assert_eq!(fs::read_to_string(target.join("src/b/same.txt"))?, "from b");
        assert!(!target.join(METADATA_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_archive_restore_of_garbage_is_archive_error() -> std::io::Result<()> {
        let temp = TempDir::new()?;
        let archive = temp.path().join("backup-1.zip");
        fs::write(&archive, b"definitely not a zip")?;

        let err = RestoreStrategy::Archive { archive }
            .restore(&temp.path().join("restore"))
            .unwrap_err();
        assert!(matches!(err, BackupError::Archive { .. }));
        Ok(())
    }
}

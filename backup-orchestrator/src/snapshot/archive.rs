//! Deflate zip archives for compressed snapshots.

use super::metadata::{SnapshotMetadata, METADATA_FILE};
use crate::utils::errors::{BackupError, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const ARCHIVE_EXTENSION: &str = "zip";
const PARTIAL_SUFFIX: &str = ".partial";

/// Upper bound on the in-archive metadata entry; anything larger is treated as corrupt
pub const MAX_METADATA_BYTES: u64 = 16 * 1024 * 1024;

/// Sizes measured while packing a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {
    /// Bytes of stored files, metadata excluded
    pub original_size: u64,
    /// Size of the finished archive
    pub compressed_size: u64,
    /// Stored files packed, metadata excluded
    pub files: usize,
}

impl CompressionStats {
    /// Space saved in percent: `(1 - compressed / original) * 100`, 0 for an empty snapshot
    pub fn ratio_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_size as f64 / self.original_size as f64) * 100.0
    }
}

/// Whether a path names a finished snapshot archive
pub fn is_archive(path: &Path) -> bool {
    path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ARCHIVE_EXTENSION)
}

/// Pack every file under `source_dir` into `archive`, paths relative to `source_dir`.
///
/// The archive is written under a `.partial` name and renamed once complete,
/// so readers never see a truncated archive.
pub fn pack_directory(source_dir: &Path, archive: &Path) -> Result<CompressionStats> {
    let mut partial = archive.as_os_str().to_owned();
    partial.push(PARTIAL_SUFFIX);
    let partial = PathBuf::from(partial);

    let result = write_archive(source_dir, &partial);
    let mut stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
    };

    fs::rename(&partial, archive)?;
    stats.compressed_size = fs::metadata(archive)?.len();
    Ok(stats)
}

fn write_archive(source_dir: &Path, partial: &Path) -> Result<CompressionStats> {
    let file = File::create(partial)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut stats = CompressionStats {
        original_size: 0,
        compressed_size: 0,
        files: 0,
    };

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry.path().strip_prefix(source_dir).unwrap_or(entry.path());
        let name = entry_name(relative);
        let size = entry.metadata().map_err(io::Error::from)?.len();

        zip.start_file(name.as_str(), options.large_file(size >= u32::MAX as u64))
            .map_err(|e| BackupError::archive(partial, e))?;
        let mut source = File::open(entry.path())?;
        io::copy(&mut source, &mut zip).map_err(|e| BackupError::archive(partial, e.into()))?;

        if name != METADATA_FILE {
            stats.original_size += size;
            stats.files += 1;
        }
    }

    zip.finish().map_err(|e| BackupError::archive(partial, e))?;
    Ok(stats)
}

/// Zip entry name for a relative path, always `/`-separated
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Read snapshot metadata from the archive root without extracting anything else
pub fn read_metadata(archive: &Path) -> Result<SnapshotMetadata> {
    let file = File::open(archive).map_err(|e| BackupError::corrupt(archive, e))?;
    let mut zip = ZipArchive::new(file).map_err(|e| BackupError::archive(archive, e))?;
    let mut entry = zip
        .by_name(METADATA_FILE)
        .map_err(|e| BackupError::corrupt(archive, e))?;

    if entry.size() > MAX_METADATA_BYTES {
        return Err(BackupError::corrupt(
            archive,
            format!("metadata entry declares {} bytes", entry.size()),
        ));
    }

    // The declared size comes from the archive itself, so the read is capped too
    let mut bytes = Vec::new();
    entry
        .by_ref()
        .take(MAX_METADATA_BYTES + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| BackupError::corrupt(archive, e))?;
    if bytes.len() as u64 > MAX_METADATA_BYTES {
        return Err(BackupError::corrupt(archive, "metadata entry is too large"));
    }
    SnapshotMetadata::from_slice(&bytes, archive)
}

/// Map an archive entry name onto a relative path, rejecting names that would
/// escape the extraction root.
pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return None;
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

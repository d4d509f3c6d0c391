//! Source discovery for backup profiles.
//!
//! Walks each configured source tree and keeps the regular files accepted by
//! its include/exclude globs. Globs are compiled with `literal_separator` so
//! `*` stays within one path segment and `**` crosses segments.

use crate::config::SourcePathConfig;
use crate::utils::errors::{BackupError, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Compile glob patterns into one set. Returns `None` for an empty list.
///
/// With `right_anchored`, a relative pattern that does not already start with
/// `**` gets an implicit `**/` prefix so it matches at any depth.
pub(crate) fn compile_globs(patterns: &[String], right_anchored: bool) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let source = if right_anchored && !pattern.starts_with('/') && !pattern.starts_with("**") {
            format!("**/{}", pattern)
        } else {
            pattern.clone()
        };

        let glob = GlobBuilder::new(&source)
            .literal_separator(true)
            .build()
            .map_err(|e| BackupError::Glob {
                pattern: pattern.clone(),
                source: e,
            })?;
        builder.add(glob);
    }

    let set = builder.build().map_err(|e| BackupError::Glob {
        pattern: "<set>".to_string(),
        source: e,
    })?;
    Ok(Some(set))
}

/// Include/exclude rules for one source tree
#[derive(Debug, Clone, Default)]
pub struct PathFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathFilter {
    /// Include globs are anchored at the source root; exclude globs match at any depth.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile_globs(include, false)?,
            exclude: compile_globs(exclude, true)?,
        })
    }

    /// Decide whether a path relative to the source root is backed up
    pub fn allows(&self, relative: &Path) -> bool {
        if self
            .exclude
            .as_ref()
            .is_some_and(|exclude| exclude.is_match(relative))
        {
            return false;
        }

        match &self.include {
            Some(include) => include.is_match(relative),
            None => true,
        }
    }
}

/// Information about a file discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the file
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Symlinks are resolved to their target; links to directories and broken
    /// links yield `None`.
    fn from_entry(entry: &DirEntry, root: &Path) -> Option<Self> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

        if !std::fs::metadata(&path).ok()?.is_file() {
            return None;
        }

        Some(Self {
            path,
            relative_path,
        })
    }
}

/// Walk a directory tree and collect the files accepted by the filter.
///
/// Symlinks are not descended into. Unreadable entries below the root are
/// logged and skipped.
pub fn walk_directory(root: &Path, filter: &PathFilter) -> std::io::Result<Vec<FileInfo>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        let Some(file_info) = FileInfo::from_entry(&entry, root) else {
            continue;
        };

        if filter.allows(&file_info.relative_path) {
            files.push(file_info);
        }
    }

    Ok(files)
}

/// Discover every file a profile's sources select.
///
/// Missing source directories are warned about and skipped. The result is
/// de-duplicated and sorted.
pub fn discover_files(sources: &[SourcePathConfig]) -> Result<Vec<PathBuf>> {
    let mut discovered = BTreeSet::new();

    for source in sources {
        let base_path = source.expanded_path();

        if !base_path.exists() {
            warn!("Path does not exist: {}", base_path.display());
            continue;
        }

        let filter = PathFilter::new(&source.include, &source.exclude)?;

        match walk_directory(&base_path, &filter) {
            Ok(files) => {
                debug!("Scanned {}: {} files", base_path.display(), files.len());
                discovered.extend(files.into_iter().map(|f| f.path));
            }
            Err(e) => {
                warn!("Failed to scan {}: {}", base_path.display(), e);
            }
        }
    }

    info!("Discovered {} files for backup", discovered.len());
    Ok(discovered.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn source(root: &Path, include: &[&str], exclude: &[&str]) -> SourcePathConfig {
        SourcePathConfig {
            path: root.display().to_string(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_walk_empty_directory() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        let files = walk_directory(temp_dir.path(), &PathFilter::default())?;
        assert_eq!(files.len(), 0);
        Ok(())
    }

    #[test]
    fn test_walk_with_subdirectories() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;

        fs::create_dir(temp_dir.path().join("subdir"))?;
        fs::write(temp_dir.path().join("file1.txt"), b"content1")?;
        fs::write(temp_dir.path().join("subdir/file2.txt"), b"content2")?;

        let files = walk_directory(temp_dir.path(), &PathFilter::default())?;
        assert_eq!(files.len(), 2);
        assert!(files
            .iter()
            .any(|f| f.relative_path == Path::new("subdir/file2.txt")
                && f.path == temp_dir.path().join("subdir/file2.txt")));

        Ok(())
    }

    #[test]
    fn test_filter_include_and_exclude() {
        let filter = PathFilter::new(
            &["**/*.txt".to_string()],
            &["**/temp/**".to_string()],
        )
        .unwrap();

        assert!(filter.allows(Path::new("test.txt")));
        assert!(filter.allows(Path::new("a/b/test.txt")));
        assert!(!filter.allows(Path::new("temp/temp.txt")));
        assert!(!filter.allows(Path::new("config.json")));
    }

    #[test]
    fn test_star_stays_in_segment() {
        let filter = PathFilter::new(&["*.txt".to_string()], &[]).unwrap();
        assert!(filter.allows(Path::new("top.txt")));
        assert!(!filter.allows(Path::new("nested/deep.txt")));
    }

    #[test]
    fn test_exclude_matches_at_any_depth() {
        let filter = PathFilter::new(&[], &["*.tmp".to_string()]).unwrap();
        assert!(!filter.allows(Path::new("a/b/scratch.tmp")));
        assert!(filter.allows(Path::new("a/b/keep.txt")));
    }

    #[test]
    fn test_discover_files_applies_rules() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("test.txt"), b"test content")?;
        fs::write(temp_dir.path().join("secret.key"), b"secret key")?;
        fs::create_dir(temp_dir.path().join("temp"))?;
        fs::write(temp_dir.path().join("temp/temp.txt"), b"temp file")?;

        let sources = vec![source(temp_dir.path(), &["**/*.txt"], &["**/temp/**"])];
        let files = discover_files(&sources).unwrap();

        assert_eq!(files, vec![temp_dir.path().join("test.txt")]);
        Ok(())
    }

    #[test]
    fn test_discover_missing_source_is_skipped() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.txt"), b"a")?;

        let sources = vec![
            source(&temp_dir.path().join("missing"), &[], &[]),
            source(temp_dir.path(), &[], &[]),
        ];
        let files = discover_files(&sources).unwrap();
        assert_eq!(files.len(), 1);
        Ok(())
    }

    #[test]
    fn test_discover_deduplicates_overlapping_sources() -> std::io::Result<()> {
        let temp_dir = TempDir::new()?;
        fs::write(temp_dir.path().join("a.txt"), b"a")?;

        let sources = vec![
            source(temp_dir.path(), &["*.txt"], &[]),
            source(temp_dir.path(), &["**/*"], &[]),
        ];
        let files = discover_files(&sources).unwrap();
        assert_eq!(files.len(), 1);
        Ok(())
    }
}

//! Rule-based tier classification.
//!
//! Every file is tested against the sensitivity rules (path keywords and file
//! extensions) and the criticality globs, then routed:
//!
//! | sensitive | critical | tiers                                              |
//! |-----------|----------|----------------------------------------------------|
//! | no        | no       | remote_primary                                     |
//! | yes       | no       | remote_sensitive                                   |
//! | no        | yes      | remote_primary, local_airgapped                    |
//! | yes       | yes      | remote_sensitive, remote_primary, local_airgapped  |
//!
//! The last row lets a sensitive file reach the general-purpose tier. That
//! overlap is kept as-is and covered by tests; see DESIGN.md.
//!
//! Keywords match case-insensitively: configured keywords and the full path
//! are both lower-cased before comparison, so `Secret` in the config matches
//! `/home/u/SECRETS/a.txt`.

use crate::config::ClassificationConfig;
use crate::fs::walker::compile_globs;
use crate::tiers::TierName;
use crate::utils::errors::Result;
use globset::GlobSet;
use std::path::{Path, PathBuf};
use tracing::info;

/// Compiled classification rules
#[derive(Debug, Clone)]
pub struct Classifier {
    keywords: Vec<String>,
    extensions: Vec<String>,
    critical: Option<GlobSet>,
}

impl Classifier {
    pub fn new(rules: &ClassificationConfig) -> Result<Self> {
        let keywords = rules
            .sensitive
            .keywords
            .iter()
            .map(|k| k.to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let extensions = rules
            .sensitive
            .file_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| ext.len() > 1)
            .collect();

        Ok(Self {
            keywords,
            extensions,
            critical: compile_globs(&rules.critical.patterns, true)?,
        })
    }

    /// Path contains a sensitive keyword or carries a sensitive extension
    pub fn is_sensitive(&self, path: &Path) -> bool {
        let lowered = path.to_string_lossy().to_lowercase();
        if self.keywords.iter().any(|k| lowered.contains(k.as_str())) {
            return true;
        }

        match path.extension() {
            Some(ext) => {
                let suffix = format!(".{}", ext.to_string_lossy().to_lowercase());
                self.extensions.iter().any(|e| *e == suffix)
            }
            None => false,
        }
    }

    /// Path matches one of the critical globs
    pub fn is_critical(&self, path: &Path) -> bool {
        self.critical
            .as_ref()
            .is_some_and(|critical| critical.is_match(path))
    }

    /// Assign every file to its tiers. Total over any input, including empty.
    pub fn classify(&self, files: &[PathBuf]) -> TierAssignment {
        let mut assignment = TierAssignment::default();

        for file in files {
            let is_sensitive = self.is_sensitive(file);
            let is_critical = self.is_critical(file);

            if is_sensitive {
                assignment.remote_sensitive.push(file.clone());
            }

            if is_critical {
                assignment.remote_primary.push(file.clone());
                assignment.local_airgapped.push(file.clone());
            } else if !is_sensitive {
                assignment.remote_primary.push(file.clone());
            }
        }

        info!(
            "File classification: primary={}, sensitive={}, local={}",
            assignment.remote_primary.len(),
            assignment.remote_sensitive.len(),
            assignment.local_airgapped.len()
        );

        assignment
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Files routed to each tier, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierAssignment {
    pub remote_primary: Vec<PathBuf>,
    pub remote_sensitive: Vec<PathBuf>,
    pub local_airgapped: Vec<PathBuf>,
}

impl TierAssignment {
    pub fn files(&self, tier: TierName) -> &[PathBuf] {
        match tier {
            TierName::RemotePrimary => &self.remote_primary,
            TierName::RemoteSensitive => &self.remote_sensitive,
            TierName::LocalAirgapped => &self.local_airgapped,
        }
    }

    /// Tiers a given file was assigned to
    pub fn tiers_for(&self, path: &Path) -> Vec<TierName> {
        TierName::ALL
            .into_iter()
            .filter(|tier| self.files(*tier).iter().any(|f| f == path))
            .collect()
    }

    /// Non-empty tiers with their files, in dispatch order
    pub fn non_empty(&self) -> impl Iterator<Item = (TierName, &[PathBuf])> + '_ {
        TierName::ALL
            .into_iter()
            .map(move |tier| (tier, self.files(tier)))
            .filter(|(_, files)| !files.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.non_empty().next().is_none()
    }
}

//! Configuration management for the backup orchestrator.
//!
//! Loads configuration from a TOML file. Every section the core depends on is
//! a typed struct, validated once when the file is loaded.

use crate::classifier::Classifier;
use crate::fs::walker::PathFilter;
use crate::utils::errors::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backup profiles by name
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// General-purpose remote object storage
    pub remote_primary: RemoteTierConfig,

    /// Privacy-focused remote sync for sensitive files
    pub remote_sensitive: RemoteTierConfig,

    /// Local air-gapped snapshots
    pub local: LocalTierConfig,

    /// Sensitivity and criticality rules
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Where per-run summaries are written
    #[serde(default = "default_summary_directory")]
    pub summary_directory: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// Source trees scanned by this profile
    #[serde(default)]
    pub paths: Vec<SourcePathConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePathConfig {
    /// Base directory; `~`, `$VAR` and `${VAR}` are expanded
    pub path: String,

    /// Include globs relative to the base directory (empty = everything)
    #[serde(default)]
    pub include: Vec<String>,

    /// Exclude globs relative to the base directory
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteTierConfig {
    pub enabled: bool,

    /// Bucket, drive folder or other destination label
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTierConfig {
    pub enabled: bool,

    /// Backup root holding one directory or archive per run
    #[serde(default = "default_backup_directory")]
    pub backup_directory: PathBuf,

    /// Pack each snapshot into a deflate archive after copying
    #[serde(default)]
    pub compression: bool,

    /// Delete the loose snapshot directory once its archive is written
    #[serde(default = "default_remove_loose")]
    pub remove_loose_after_compress: bool,

    /// Snapshots older than this many days are swept after each local backup
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default)]
    pub sensitive: SensitiveRules,

    #[serde(default)]
    pub critical: CriticalRules,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensitiveRules {
    /// Substrings of the lower-cased path that mark a file sensitive
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Extensions (with leading dot) that mark a file sensitive
    #[serde(default)]
    pub file_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriticalRules {
    /// Globs that mark a file critical
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Optional log file, appended to alongside stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

// Default values
fn default_backup_directory() -> PathBuf {
    PathBuf::from("/tmp/local-backups")
}

fn default_remove_loose() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_summary_directory() -> PathBuf {
    state_dir().join("summaries")
}

fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".backup-recovery")
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> PathBuf {
        state_dir().join("config.toml")
    }

    /// Load and validate configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| BackupError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything the core would otherwise trip over at run time.
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in &self.profiles {
            for source in &profile.paths {
                if source.path.trim().is_empty() {
                    return Err(BackupError::Config(format!(
                        "profile '{}' has a source with an empty path",
                        name
                    )));
                }
                PathFilter::new(&source.include, &source.exclude).map_err(|e| {
                    BackupError::Config(format!("profile '{}': {}", name, e))
                })?;
            }
        }

        Classifier::new(&self.classification)
            .map_err(|e| BackupError::Config(format!("classification: {}", e)))?;

        if self.local.retention_days == Some(0) {
            return Err(BackupError::Config(
                "local.retention_days must be at least 1".to_string(),
            ));
        }

        if self.local.enabled && self.local.backup_directory.as_os_str().is_empty() {
            return Err(BackupError::Config(
                "local.backup_directory must be set when the local tier is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Look up a profile by name
    pub fn profile(&self, name: &str) -> Result<&ProfileConfig> {
        self.profiles
            .get(name)
            .ok_or_else(|| BackupError::ProfileNotFound(name.to_string()))
    }
}

impl SourcePathConfig {
    /// Base directory with `~` and environment variables expanded
    pub fn expanded_path(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.path))
    }
}

/// Expand a leading `~` and `$VAR` / `${VAR}` references.
///
/// Unknown variables are left verbatim.
pub fn expand_path(raw: &str) -> String {
    shellexpand::full_with_context_no_errors(
        raw,
        || dirs::home_dir().map(|home| home.to_string_lossy().into_owned()),
        |name| std::env::var(name).ok(),
    )
    .into_owned()
}

//! Backup Orchestrator Library
//!
//! Discovers files for a backup profile, classifies them by sensitivity and
//! criticality, and routes them to remote and local air-gapped tiers.

pub mod classifier;
pub mod config;
pub mod dispatch;
pub mod fs;
pub mod orchestrator;
pub mod snapshot;
pub mod tiers;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use orchestrator::Orchestrator;
pub use utils::errors::{BackupError, Result};

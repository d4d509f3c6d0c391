//! Run bookkeeping and the persisted run summary.

use crate::dispatch::DispatchReport;
use crate::tiers::TierName;
use crate::utils::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Run identifier for a run started at `now`: `backup-YYYYMMDD-HHMMSS`
pub fn generate_run_id(now: DateTime<Utc>) -> String {
    now.format("backup-%Y%m%d-%H%M%S").to_string()
}

/// State of one orchestration run, owned by the orchestrator until finished
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRun {
    pub run_id: String,
    pub profile: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Outcome of every tier that was invoked
    pub tier_outcomes: BTreeMap<TierName, bool>,
    /// Invoked tiers that succeeded, in dispatch order
    pub tiers_completed: Vec<TierName>,
    pub files_processed: usize,
    pub files_failed: usize,
    pub success: bool,
}

impl BackupRun {
    pub fn start(profile: &str) -> Self {
        let started_at = Utc::now();
        Self {
            run_id: generate_run_id(started_at),
            profile: profile.to_string(),
            started_at,
            finished_at: None,
            tier_outcomes: BTreeMap::new(),
            tiers_completed: Vec::new(),
            files_processed: 0,
            files_failed: 0,
            success: false,
        }
    }

    /// Fold a dispatch report into the run
    pub fn record(&mut self, report: &DispatchReport) {
        for outcome in &report.outcomes {
            self.tier_outcomes.insert(outcome.tier, outcome.is_success());
        }
        self.tiers_completed = report.completed_tiers();
        self.files_failed += report.files_failed();
    }

    pub fn finish(&mut self, success: bool) {
        self.success = success;
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            backup_id: self.run_id.clone(),
            duration_seconds: self.duration_seconds(),
            files_processed: self.files_processed,
            files_failed: self.files_failed,
            tiers_completed: self.tiers_completed.clone(),
            timestamp: self.finished_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Persisted form of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub backup_id: String,
    pub duration_seconds: f64,
    pub files_processed: usize,
    pub files_failed: usize,
    pub tiers_completed: Vec<TierName>,
    pub timestamp: DateTime<Utc>,
}

impl RunSummary {
    pub fn file_name(&self) -> String {
        format!("{}-summary.json", self.backup_id)
    }

    /// Write `<run-id>-summary.json` into `dir`, creating it if needed
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        Ok(path)
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Provisioned, PythonVersion},
    errors::Error,
    locks::LockSweep,
    ports::Filesystem,
    utils::iso_timestamp_utc,
    Result,
};

pub const REPORT_FILE: &str = "bootstrap-last.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// `exit_code` is filled in once the bot exits.
    Launched { exit_code: Option<i32> },
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirStatus {
    pub path: PathBuf,
    pub status: Provisioned,
}

/// What the last bootstrap run did, persisted under `logs/`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BootstrapReport {
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub work_dir: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<PythonVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venv: Option<Provisioned>,
    #[serde(default)]
    pub dirs: Vec<DirStatus>,
    #[serde(default)]
    pub locks: LockSweep,
    #[serde(default)]
    pub screenshots_pruned: usize,
    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl BootstrapReport {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            started_at: iso_timestamp_utc(),
            finished_at: None,
            work_dir: work_dir.into(),
            interpreter: None,
            python_version: None,
            venv: None,
            dirs: Vec::new(),
            locks: LockSweep::default(),
            screenshots_pruned: 0,
            warnings: Vec::new(),
            outcome: None,
        }
    }

    pub fn fail(&mut self, err: &Error) {
        self.finished_at = Some(iso_timestamp_utc());
        self.outcome = Some(Outcome::Failed {
            error: err.to_string(),
        });
    }

    pub fn launched(&mut self, exit_code: Option<i32>) {
        if exit_code.is_some() {
            self.finished_at = Some(iso_timestamp_utc());
        }
        self.outcome = Some(Outcome::Launched { exit_code });
    }
}

/// Write `report` to `<logs_dir>/bootstrap-last.json`.
pub fn write_report(fs: &dyn Filesystem, logs_dir: &Path, report: &BootstrapReport) -> Result<PathBuf> {
    let path = logs_dir.join(REPORT_FILE);
    let json = serde_json::to_vec_pretty(report)?;
    fs.write(&path, &json)?;
    Ok(path)
}

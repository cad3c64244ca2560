use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use crate::{ports::Filesystem, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete regular files directly under `dir` last modified more than `max_age`
/// before `now`. Per-file failures are collected, not raised.
pub fn prune_older_than(
    fs: &dyn Filesystem,
    dir: &Path,
    max_age: Duration,
    now: SystemTime,
) -> Result<PruneReport> {
    let mut report = PruneReport::default();
    if !fs.is_dir(dir) {
        return Ok(report);
    }

    for entry in fs.list_dir(dir)? {
        if !entry.is_file {
            continue;
        }
        let Some(modified) = entry.modified else {
            continue;
        };
        // Future mtimes (clock skew) count as fresh.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        match fs.remove_file(&entry.path) {
            Ok(()) => {
                tracing::info!(file = %entry.path.display(), "removed old file");
                report.removed.push(entry.path);
            }
            Err(e) => {
                tracing::warn!(file = %entry.path.display(), error = %e, "failed to remove old file");
                report.failed.push((entry.path, e.to_string()));
            }
        }
    }

    Ok(report)
}

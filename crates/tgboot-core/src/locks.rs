//! Stale session-lock cleanup.
//!
//! The bot takes `flock` locks on `sessions/<name>.lock`. A lock file whose
//! advisory lock can be acquired belongs to no live process and is removed; one
//! that is still held is left alone unless cleanup is forced. Only regular
//! files are considered, and a lock that cannot be opened for the check is
//! kept with a warning instead of failing the bootstrap.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, ports::Filesystem, Result};

pub const LOCK_SUFFIX: &str = ".lock";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSweep {
    pub removed: Vec<PathBuf>,
    /// Locks still held by a live process (kept).
    pub held: Vec<PathBuf>,
    /// Locks whose liveness could not be checked for lack of permission (kept).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unreadable: Vec<PathBuf>,
}

pub fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(LOCK_SUFFIX))
        .unwrap_or(false)
}

/// Walk `dir` recursively and clear lock files. A missing `dir` is an empty sweep.
pub fn sweep_stale_locks(fs: &dyn Filesystem, dir: &Path, force: bool) -> Result<LockSweep> {
    let mut sweep = LockSweep::default();
    if !fs.is_dir(dir) {
        return Ok(sweep);
    }
    sweep_dir(fs, dir, force, &mut sweep)?;
    Ok(sweep)
}

fn sweep_dir(fs: &dyn Filesystem, dir: &Path, force: bool, sweep: &mut LockSweep) -> Result<()> {
    for entry in fs.list_dir(dir)? {
        if entry.is_dir {
            sweep_dir(fs, &entry.path, force, sweep)?;
            continue;
        }
        if !is_lock_file(&entry.path) {
            continue;
        }
        if !entry.is_file {
            tracing::debug!(path = %entry.path.display(), "not a regular file, skipping");
            continue;
        }

        if !force {
            match fs.is_locked(&entry.path) {
                Ok(false) => {}
                Ok(true) => {
                    tracing::warn!(lock = %entry.path.display(), "session lock is held by a live process, keeping it");
                    sweep.held.push(entry.path);
                    continue;
                }
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    tracing::warn!(lock = %entry.path.display(), error = %e, "cannot check session lock, keeping it");
                    sweep.unreadable.push(entry.path);
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        match fs.remove_file(&entry.path) {
            Ok(()) => {
                tracing::debug!(lock = %entry.path.display(), "removed stale lock");
                sweep.removed.push(entry.path);
            }
            // Released and deleted by its owner between listing and removal.
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

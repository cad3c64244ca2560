//! Isolated environment provisioning and activation.

use std::{ffi::OsStr, path::Path};

use crate::{
    domain::{ActiveEnv, Provisioned},
    errors::Error,
    ports::{Filesystem, Invocation, ProcessRunner},
    utils::truncate_text,
    Result,
};

/// Create the venv at `dir` with `interpreter` unless `dir` already exists.
pub async fn provision(
    fs: &dyn Filesystem,
    runner: &dyn ProcessRunner,
    interpreter: &Path,
    dir: &Path,
    cwd: &Path,
) -> Result<(ActiveEnv, Provisioned)> {
    let env = ActiveEnv::at(dir);
    if fs.exists(dir) {
        tracing::debug!(venv = %dir.display(), "virtual environment already present");
        return Ok((env, Provisioned::AlreadyPresent));
    }

    let inv = Invocation::new(interpreter, cwd)
        .args(["-m", "venv"])
        .arg(dir.to_string_lossy());
    tracing::info!(cmd = %inv.display(), "creating virtual environment");

    let out = runner.output(&inv, None).await?;
    if !out.success() {
        return Err(Error::External(format!(
            "creating virtual environment at {} failed ({:?}): {}",
            dir.display(),
            out.code,
            truncate_text(out.stderr.trim(), 2000)
        )));
    }

    if !fs.exists(&env.python) {
        tracing::warn!(python = %env.python.display(), "virtual environment has no interpreter where expected");
    }
    Ok((env, Provisioned::Created))
}

/// An invocation of the venv interpreter with the environment activated.
pub fn activated_invocation(
    env: &ActiveEnv,
    cwd: &Path,
    inherited_path: Option<&OsStr>,
) -> Invocation {
    let mut inv = Invocation::new(&env.python, cwd).envs(env.env_vars(inherited_path));
    for key in ActiveEnv::removed_vars() {
        inv = inv.env_remove(*key);
    }
    inv
}

use std::{ffi::OsStr, path::Path, time::Duration};

use crate::{
    domain::ActiveEnv,
    errors::Error,
    ports::{Filesystem, ProcessRunner},
    utils::truncate_text,
    venv::activated_invocation,
    Result,
};

/// `pip install -r <manifest>` inside the activated environment.
///
/// Any failure (missing manifest, non-zero exit, timeout) is fatal.
pub async fn install_requirements(
    fs: &dyn Filesystem,
    runner: &dyn ProcessRunner,
    env: &ActiveEnv,
    manifest: &Path,
    cwd: &Path,
    inherited_path: Option<&OsStr>,
    timeout: Option<Duration>,
) -> Result<()> {
    if !fs.exists(manifest) {
        return Err(Error::MissingManifest(manifest.to_path_buf()));
    }

    let inv = activated_invocation(env, cwd, inherited_path)
        .args(["-m", "pip", "install", "-r"])
        .arg(manifest.to_string_lossy());
    tracing::info!(cmd = %inv.display(), "installing dependencies");

    let out = runner
        .output(&inv, timeout)
        .await
        .map_err(|e| Error::DependencyInstall(e.to_string()))?;

    if !out.success() {
        return Err(Error::DependencyInstall(format!(
            "pip exited with {:?}: {}",
            out.code,
            truncate_text(out.stderr.trim(), 2000)
        )));
    }
    Ok(())
}

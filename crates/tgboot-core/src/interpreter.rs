//! Python interpreter discovery and version gating.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use regex::Regex;

use crate::{
    domain::PythonVersion,
    errors::Error,
    ports::{Invocation, ProcessRunner},
    utils::truncate_text,
    Result,
};

/// Prints `major.minor`; valid under both Python 2 and 3 so old interpreters
/// fail the version gate instead of the probe.
pub const VERSION_PROBE: &str = "import sys; print('%d.%d' % sys.version_info[:2])";

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)").expect("valid regex"))
}

/// Extract the first `major.minor` pair from interpreter output.
///
/// Accepts both the probe's bare `3.11` and `python --version` style
/// `Python 3.11.4`.
pub fn parse_version(text: &str) -> Option<PythonVersion> {
    let caps = version_re().captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some(PythonVersion::new(major, minor))
}

pub fn locate(
    runner: &dyn ProcessRunner,
    name: &str,
    search_path: Option<&OsStr>,
) -> Result<PathBuf> {
    runner.locate(name, search_path).ok_or_else(|| Error::MissingRuntime {
        interpreter: name.to_string(),
    })
}

pub async fn probe_version(
    runner: &dyn ProcessRunner,
    interpreter: &Path,
    cwd: &Path,
) -> Result<PythonVersion> {
    let inv = Invocation::new(interpreter, cwd).args(["-c", VERSION_PROBE]);
    let out = runner.output(&inv, None).await?;

    if !out.success() {
        return Err(Error::External(format!(
            "{} exited with {:?} while reporting its version: {}",
            interpreter.display(),
            out.code,
            truncate_text(out.stderr.trim(), 500)
        )));
    }

    parse_version(&out.stdout).ok_or_else(|| {
        Error::External(format!(
            "could not parse python version from {:?}",
            truncate_text(out.stdout.trim(), 200)
        ))
    })
}

pub fn check_version(found: PythonVersion, required: PythonVersion) -> Result<()> {
    if found < required {
        return Err(Error::UnsupportedVersion { found, required });
    }
    Ok(())
}

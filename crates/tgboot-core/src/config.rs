use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::PythonVersion, errors::Error, interpreter::parse_version, utils, Result};

pub const DEFAULT_PYTHON: &str = "python3";
pub const DEFAULT_MIN_PYTHON: PythonVersion = PythonVersion::new(3, 7);
pub const DEFAULT_VENV_DIR: &str = "../venv";
pub const DEFAULT_ENV_FILE: &str = "../.env";
pub const DEFAULT_REQUIREMENTS: &str = "../requirements.txt";
pub const DEFAULT_BOT_SCRIPT: &str = "bot.py";
pub const DEFAULT_SCREENSHOT_MAX_AGE_HOURS: u64 = 24;

/// Typed bootstrapper settings.
///
/// Every path is already resolved against `work_dir`.
#[derive(Clone, Debug)]
pub struct Config {
    pub work_dir: PathBuf,

    // Interpreter
    pub python: String,
    pub min_python: PythonVersion,

    // Layout
    pub venv_dir: PathBuf,
    pub env_file: PathBuf,
    pub requirements: PathBuf,
    pub bot_script: PathBuf,

    // Behavior flags
    pub force_lock_cleanup: bool,
    pub screenshot_max_age: Option<Duration>,
    pub install_timeout: Option<Duration>,

    /// `PATH` inherited by the bootstrapper, used for interpreter lookup and
    /// as the tail of the activated environment's `PATH`.
    pub search_path: Option<OsString>,
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        let cwd = env::current_dir()?;
        let mut cfg = Self::from_lookup(&cwd, |key| env::var(key).ok())?;
        cfg.search_path = env::var_os("PATH");
        Ok(cfg)
    }

    /// Defaults for a given working directory, no overrides applied.
    pub fn for_work_dir(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let resolve = |raw: &str| utils::resolve_against(&work_dir, Path::new(raw));

        Self {
            python: DEFAULT_PYTHON.to_string(),
            min_python: DEFAULT_MIN_PYTHON,
            venv_dir: resolve(DEFAULT_VENV_DIR),
            env_file: resolve(DEFAULT_ENV_FILE),
            requirements: resolve(DEFAULT_REQUIREMENTS),
            bot_script: resolve(DEFAULT_BOT_SCRIPT),
            force_lock_cleanup: false,
            screenshot_max_age: Some(Duration::from_secs(
                DEFAULT_SCREENSHOT_MAX_AGE_HOURS * 3600,
            )),
            install_timeout: None,
            search_path: None,
            work_dir,
        }
    }

    /// Build from an arbitrary key lookup (the process env in production).
    pub fn from_lookup(cwd: &Path, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_str = |key: &str| lookup(key).and_then(non_empty);

        let work_dir = match env_str("TGBOOT_WORK_DIR") {
            Some(raw) => utils::resolve_against(cwd, Path::new(&raw)),
            None => cwd.to_path_buf(),
        };
        let mut cfg = Self::for_work_dir(work_dir.clone());
        let resolve = |raw: String| utils::resolve_against(&work_dir, Path::new(&raw));

        if let Some(python) = env_str("TGBOOT_PYTHON") {
            cfg.python = resolve_interpreter(&work_dir, python);
        }
        if let Some(raw) = env_str("TGBOOT_MIN_PYTHON") {
            cfg.min_python = parse_version(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "TGBOOT_MIN_PYTHON must look like MAJOR.MINOR, got {raw:?}"
                ))
            })?;
        }

        let venv_dir = env_str("TGBOOT_VENV_DIR").map(resolve);
        let env_file = env_str("TGBOOT_ENV_FILE").map(resolve);
        let requirements = env_str("TGBOOT_REQUIREMENTS").map(resolve);
        let bot_script = env_str("TGBOOT_BOT_SCRIPT").map(resolve);
        if let Some(p) = venv_dir {
            cfg.venv_dir = p;
        }
        if let Some(p) = env_file {
            cfg.env_file = p;
        }
        if let Some(p) = requirements {
            cfg.requirements = p;
        }
        if let Some(p) = bot_script {
            cfg.bot_script = p;
        }

        if let Some(raw) = env_str("TGBOOT_FORCE_LOCK_CLEANUP") {
            cfg.force_lock_cleanup = parse_bool(&raw);
        }
        if let Some(raw) = env_str("TGBOOT_SCREENSHOT_MAX_AGE_HOURS") {
            let hours = parse_u64("TGBOOT_SCREENSHOT_MAX_AGE_HOURS", &raw)?;
            let secs = hours.checked_mul(3600).ok_or_else(|| {
                Error::Config(format!(
                    "TGBOOT_SCREENSHOT_MAX_AGE_HOURS is out of range, got {raw:?}"
                ))
            })?;
            cfg.screenshot_max_age = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = env_str("TGBOOT_INSTALL_TIMEOUT_SECS") {
            let secs = parse_u64("TGBOOT_INSTALL_TIMEOUT_SECS", &raw)?;
            cfg.install_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(cfg)
    }
}

/// A bare name is left for a `PATH` lookup; a relative path is anchored at the work dir.
fn resolve_interpreter(work_dir: &Path, raw: String) -> String {
    let path = Path::new(&raw);
    if path.is_relative() && path.components().count() > 1 {
        utils::resolve_against(work_dir, path)
            .to_string_lossy()
            .into_owned()
    } else {
        raw
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

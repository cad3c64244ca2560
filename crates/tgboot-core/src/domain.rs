use std::{
    ffi::{OsStr, OsString},
    fmt,
    path::PathBuf,
};

use serde::{Deserialize, Serialize};

/// Keys the bot reads from its configuration file.
pub const REQUIRED_KEYS: [&str; 3] = ["API_ID", "API_HASH", "BOT_TOKEN"];

pub const LOGS_DIR: &str = "logs";
pub const SESSIONS_DIR: &str = "sessions";
pub const SCREENSHOTS_DIR: &str = "captcha_screenshots";

/// Working directories that must exist before the bot starts.
pub const WORK_DIRS: [&str; 3] = [LOGS_DIR, SESSIONS_DIR, SCREENSHOTS_DIR];

/// Python `major.minor` version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PythonVersion {
    pub major: u32,
    pub minor: u32,
}

impl PythonVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Result of an idempotent "ensure" step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provisioned {
    Created,
    AlreadyPresent,
}

/// An activated virtual environment, passed explicitly to later steps instead of
/// mutating the bootstrapper's own process environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveEnv {
    pub root: PathBuf,
    pub bin_dir: PathBuf,
    pub python: PathBuf,
}

impl ActiveEnv {
    pub fn at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let (bin, exe) = if cfg!(windows) {
            ("Scripts", "python.exe")
        } else {
            ("bin", "python")
        };
        let bin_dir = root.join(bin);
        let python = bin_dir.join(exe);
        Self {
            root,
            bin_dir,
            python,
        }
    }

    /// Variables an activation script would export, given the inherited `PATH`.
    pub fn env_vars(&self, inherited_path: Option<&OsStr>) -> Vec<(String, String)> {
        let mut parts = vec![self.bin_dir.clone()];
        if let Some(current) = inherited_path {
            parts.extend(std::env::split_paths(current).filter(|p| p != &self.bin_dir));
        }
        let path = std::env::join_paths(&parts)
            .unwrap_or_else(|_| OsString::from(self.bin_dir.as_os_str()));

        vec![
            (
                "VIRTUAL_ENV".to_string(),
                self.root.to_string_lossy().into_owned(),
            ),
            ("PATH".to_string(), path.to_string_lossy().into_owned()),
        ]
    }

    /// Variables an activation script unsets.
    pub fn removed_vars() -> &'static [&'static str] {
        &["PYTHONHOME"]
    }
}

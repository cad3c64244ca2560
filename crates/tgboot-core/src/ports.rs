use std::{
    ffi::OsStr,
    fs::{self, File, OpenOptions, TryLockError},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;

use crate::Result;

// ============== Filesystem ==============

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Regular file. Symlinks, FIFOs, sockets and devices are neither this nor `is_dir`.
    pub is_file: bool,
    pub modified: Option<SystemTime>,
}

/// Hexagonal port for every filesystem effect the bootstrapper has.
pub trait Filesystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>>;
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Whether some live process holds an exclusive advisory lock on `path`.
    ///
    /// A missing file or anything that is not a regular file is never locked.
    /// A file that cannot be opened for the check is an `Io` error.
    fn is_locked(&self, path: &Path) -> Result<bool>;
}

/// `std::fs` backed implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsFilesystem;

impl Filesystem for OsFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        // Write to a sibling temp file first so readers never see a torn report.
        let tmp = path.with_extension("tmp");
        {
            let mut f = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp)?;
            f.write_all(contents)?;
            f.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            // symlink_metadata: never follow links out of the directory being swept.
            let md = fs::symlink_metadata(entry.path())?;
            out.push(DirEntryInfo {
                path: entry.path(),
                is_dir: md.is_dir(),
                is_file: md.is_file(),
                modified: md.modified().ok(),
            });
        }
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn is_locked(&self, path: &Path) -> Result<bool> {
        // Opening a FIFO would block until a writer shows up.
        match fs::symlink_metadata(path) {
            Ok(md) if md.is_file() => {}
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match file.try_lock() {
            Ok(()) => {
                file.unlock()?;
                Ok(false)
            }
            Err(TryLockError::WouldBlock) => Ok(true),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }
}

// ============== Processes ==============

/// A concrete program invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
    pub env_remove: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
            env_remove: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }

    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.env_remove.push(key.into());
        self
    }

    /// Program plus args, for log lines.
    pub fn display(&self) -> String {
        let mut out = self.program.display().to_string();
        for a in &self.args {
            out.push(' ');
            out.push_str(a);
        }
        out
    }
}

/// Captured result of a finished process.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    /// Bounded tail of stderr.
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Hexagonal port for running external programs.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Resolve a program name (or explicit path) against `search_path`.
    fn locate(&self, program: &str, search_path: Option<&OsStr>) -> Option<PathBuf>;

    /// Run to completion with captured output. A `timeout` kills the process
    /// and fails the call.
    async fn output(&self, inv: &Invocation, timeout: Option<Duration>) -> Result<ProcessOutput>;

    /// Run with inherited stdio until it exits and return the exit code to
    /// propagate.
    async fn launch(&self, inv: &Invocation) -> Result<i32>;
}

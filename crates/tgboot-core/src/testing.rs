//! In-memory port implementations shared by the unit tests.

use std::{
    ffi::OsStr,
    collections::{BTreeMap, HashSet},
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use async_trait::async_trait;

use crate::{
    errors::Error,
    ports::{DirEntryInfo, Filesystem, Invocation, ProcessOutput, ProcessRunner},
    Result,
};

#[derive(Clone, Debug)]
enum Node {
    Dir,
    File {
        contents: String,
        modified: SystemTime,
    },
    /// FIFO, socket, symlink: listed, never read.
    Special,
}

fn not_found(path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        ErrorKind::NotFound,
        format!("{} not found", path.display()),
    ))
}

fn permission_denied(path: &Path) -> Error {
    Error::Io(std::io::Error::new(
        ErrorKind::PermissionDenied,
        format!("{} is not readable", path.display()),
    ))
}

#[derive(Debug, Default)]
pub struct FakeFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    locked: Mutex<HashSet<PathBuf>>,
    unreadable: Mutex<HashSet<PathBuf>>,
    creates: Mutex<Vec<PathBuf>>,
}

impl FakeFs {
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.lock().unwrap();
        for anc in path.as_ref().ancestors() {
            if anc.as_os_str().is_empty() {
                continue;
            }
            nodes.entry(anc.to_path_buf()).or_insert(Node::Dir);
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, contents: &str) {
        self.add_file_aged(path, contents, Duration::ZERO);
    }

    pub fn add_file_aged(&self, path: impl AsRef<Path>, contents: &str, age: Duration) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node::File {
                contents: contents.to_string(),
                modified: SystemTime::now() - age,
            },
        );
    }

    /// Pretend another process holds a lock on `path`.
    pub fn hold_lock(&self, path: impl AsRef<Path>) {
        self.locked
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    /// Add a non-regular entry (think FIFO) at `path`.
    pub fn add_special(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), Node::Special);
    }

    /// Make opening `path` fail with `PermissionDenied`.
    pub fn deny_read(&self, path: impl AsRef<Path>) {
        self.unreadable
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.lock().unwrap().contains_key(path.as_ref())
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<String> {
        match self.nodes.lock().unwrap().get(path.as_ref()) {
            Some(Node::File { contents, .. }) => Some(contents.clone()),
            _ => None,
        }
    }

    /// Directories actually created through the port.
    pub fn created_dirs(&self) -> Vec<PathBuf> {
        self.creates.lock().unwrap().clone()
    }

    /// Every path currently present, for whole-tree comparisons.
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.nodes.lock().unwrap().keys().cloned().collect()
    }
}

impl Filesystem for FakeFs {
    fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.nodes.lock().unwrap().get(path), Some(Node::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        {
            let nodes = self.nodes.lock().unwrap();
            for anc in path.ancestors() {
                if let Some(Node::File { .. }) = nodes.get(anc) {
                    return Err(Error::Io(std::io::Error::new(
                        ErrorKind::AlreadyExists,
                        format!("{} is a file", anc.display()),
                    )));
                }
            }
        }
        self.add_dir(path);
        self.creates.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        if self.unreadable.lock().unwrap().contains(path) {
            return Err(permission_denied(path));
        }
        self.contents(path).ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let parent_ok = path.parent().map(|p| self.is_dir(p)).unwrap_or(false);
        if !parent_ok {
            return Err(not_found(path));
        }
        self.nodes.lock().unwrap().insert(
            path.to_path_buf(),
            Node::File {
                contents: String::from_utf8_lossy(contents).into_owned(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<DirEntryInfo>> {
        if !self.is_dir(path) {
            return Err(not_found(path));
        }
        let nodes = self.nodes.lock().unwrap();
        Ok(nodes
            .iter()
            .filter(|(p, _)| p.parent() == Some(path))
            .map(|(p, node)| match node {
                Node::Dir => DirEntryInfo {
                    path: p.clone(),
                    is_dir: true,
                    is_file: false,
                    modified: None,
                },
                Node::File { modified, .. } => DirEntryInfo {
                    path: p.clone(),
                    is_dir: false,
                    is_file: true,
                    modified: Some(*modified),
                },
                Node::Special => DirEntryInfo {
                    path: p.clone(),
                    is_dir: false,
                    is_file: false,
                    modified: Some(SystemTime::UNIX_EPOCH),
                },
            })
            .collect())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::File { .. } | Node::Special) => {
                nodes.remove(path);
                Ok(())
            }
            _ => Err(not_found(path)),
        }
    }

    fn is_locked(&self, path: &Path) -> Result<bool> {
        if !matches!(self.nodes.lock().unwrap().get(path), Some(Node::File { .. })) {
            return Ok(false);
        }
        if self.unreadable.lock().unwrap().contains(path) {
            return Err(permission_denied(path));
        }
        Ok(self.locked.lock().unwrap().contains(path))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    VersionProbe,
    CreateVenv,
    Install,
    Other,
}

pub fn classify(inv: &Invocation) -> CallKind {
    let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
    match args.as_slice() {
        ["-c", ..] => CallKind::VersionProbe,
        ["-m", "venv", ..] => CallKind::CreateVenv,
        ["-m", "pip", "install", ..] => CallKind::Install,
        _ => CallKind::Other,
    }
}

/// Recording process runner. Creating a venv materializes it in the attached
/// `FakeFs` so repeated runs see it.
#[derive(Debug)]
pub struct FakeRunner {
    fs: Option<Arc<FakeFs>>,
    interpreter: Option<PathBuf>,
    version_output: String,
    venv_ok: bool,
    install_ok: bool,
    launch_code: i32,
    calls: Mutex<Vec<Invocation>>,
    launches: Mutex<Vec<Invocation>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            fs: None,
            interpreter: Some(PathBuf::from("/usr/bin/python3")),
            version_output: "3.11\n".to_string(),
            venv_ok: true,
            install_ok: true,
            launch_code: 0,
            calls: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRunner {
    pub fn with_fs(mut self, fs: Arc<FakeFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn without_interpreter(mut self) -> Self {
        self.interpreter = None;
        self
    }

    pub fn with_version_output(mut self, out: &str) -> Self {
        self.version_output = out.to_string();
        self
    }

    pub fn failing_venv(mut self) -> Self {
        self.venv_ok = false;
        self
    }

    pub fn failing_install(mut self) -> Self {
        self.install_ok = false;
        self
    }

    pub fn with_launch_code(mut self, code: i32) -> Self {
        self.launch_code = code;
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|inv| classify(inv) == kind)
            .collect()
    }

    pub fn launches(&self) -> Vec<Invocation> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    fn locate(&self, _program: &str, _search_path: Option<&OsStr>) -> Option<PathBuf> {
        self.interpreter.clone()
    }

    async fn output(&self, inv: &Invocation, _timeout: Option<Duration>) -> Result<ProcessOutput> {
        self.calls.lock().unwrap().push(inv.clone());

        let ok = ProcessOutput {
            code: Some(0),
            ..Default::default()
        };
        let out = match classify(inv) {
            CallKind::VersionProbe => ProcessOutput {
                stdout: self.version_output.clone(),
                ..ok
            },
            CallKind::CreateVenv if self.venv_ok => {
                if let (Some(fs), Some(dir)) = (&self.fs, inv.args.last()) {
                    let root = PathBuf::from(dir);
                    fs.add_file(root.join("bin/python"), "");
                }
                ok
            }
            CallKind::CreateVenv => ProcessOutput {
                code: Some(1),
                stderr: "Error: ensurepip is not available".to_string(),
                ..Default::default()
            },
            CallKind::Install if self.install_ok => ok,
            CallKind::Install => ProcessOutput {
                code: Some(1),
                stderr: "ERROR: No matching distribution found for telethon==0.0".to_string(),
                ..Default::default()
            },
            CallKind::Other => ok,
        };
        Ok(out)
    }

    async fn launch(&self, inv: &Invocation) -> Result<i32> {
        self.launches.lock().unwrap().push(inv.clone());
        Ok(self.launch_code)
    }
}

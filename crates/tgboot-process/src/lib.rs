//! Tokio adapter for the bootstrapper's process port.
//!
//! Captured runs (interpreter probe, venv creation, `pip install`) drain both
//! pipes in background tasks; stdout is kept whole and stderr as a bounded
//! tail. The bot launch inherits stdio. Both honour a shared cancellation token
//! so an interrupt never leaves an orphaned child behind: captured runs are
//! killed at once, the bot gets SIGINT and a grace period to clean up first.

use std::{
    collections::VecDeque,
    ffi::OsStr,
    path::PathBuf,
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tgboot_core::{
    errors::Error,
    ports::{Invocation, ProcessOutput, ProcessRunner},
    utils::which_in_path,
    Result,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    sync::Mutex,
};
use tokio_util::sync::CancellationToken;

const STDERR_TAIL_MAX_BYTES: usize = 16 * 1024;
const STDERR_TAIL_MAX_LINES: usize = 200;

/// Exit code reported when the bot had to be killed after an interrupt (SIGINT convention).
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How a cancelled bot is brought down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StopPolicy {
    /// Time the bot gets to react to a terminal's own SIGINT before one is forwarded.
    pub settle: Duration,
    /// Time between the forwarded SIGINT and SIGKILL.
    pub grace: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            grace: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug, Default)]
struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
}

impl StderrTail {
    fn push_line(&mut self, line: String) {
        // +1 for the '\n' we join with later.
        self.bytes = self.bytes.saturating_add(line.len() + 1);
        self.lines.push_back(line);

        while self.lines.len() > STDERR_TAIL_MAX_LINES || self.bytes > STDERR_TAIL_MAX_BYTES {
            if let Some(front) = self.lines.pop_front() {
                self.bytes = self.bytes.saturating_sub(front.len() + 1);
            } else {
                break;
            }
        }
    }

    fn snapshot(&self) -> String {
        self.lines.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

enum Waited {
    Exited(ExitStatus),
    Cancelled,
    TimedOut(Duration),
}

#[derive(Clone, Debug, Default)]
pub struct TokioProcessRunner {
    cancel: CancellationToken,
    stop: StopPolicy,
}

impl TokioProcessRunner {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            stop: StopPolicy::default(),
        }
    }

    pub fn with_stop_policy(mut self, stop: StopPolicy) -> Self {
        self.stop = stop;
        self
    }

    async fn wait(&self, child: &mut Child, timeout: Option<Duration>) -> Result<Waited> {
        let deadline = async {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        Ok(tokio::select! {
            status = child.wait() => Waited::Exited(status?),
            _ = self.cancel.cancelled() => Waited::Cancelled,
            _ = deadline => Waited::TimedOut(timeout.unwrap_or_default()),
        })
    }

    /// Brings a cancelled bot down and returns the exit code to propagate.
    ///
    /// A terminal Ctrl-C reaches the bot directly, so it first gets `settle` to
    /// exit on its own. Then SIGINT is forwarded, and after `grace` the bot is
    /// killed.
    async fn stop_gracefully(&self, child: &mut Child) -> Result<i32> {
        if let Ok(status) = tokio::time::timeout(self.stop.settle, child.wait()).await {
            return Ok(exit_code(status?));
        }

        interrupt(child);
        match tokio::time::timeout(self.stop.grace, child.wait()).await {
            Ok(status) => Ok(exit_code(status?)),
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.stop.grace.as_secs_f64(),
                    "bot did not exit after interrupt; killing it"
                );
                kill_and_reap(child).await?;
                Ok(INTERRUPTED_EXIT_CODE)
            }
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &Child) {
    use nix::{
        sys::signal::{kill, Signal},
        unistd::Pid,
    };

    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    // ESRCH just means it exited in the meantime.
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGINT) {
        tracing::debug!(pid, "failed to forward SIGINT: {e}");
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) {}

fn command(inv: &Invocation) -> Command {
    let mut cmd = Command::new(&inv.program);
    cmd.args(&inv.args).current_dir(&inv.cwd).kill_on_drop(true);
    for (k, v) in &inv.env {
        cmd.env(k, v);
    }
    for k in &inv.env_remove {
        cmd.env_remove(k);
    }
    cmd
}

fn spawn(mut cmd: Command, inv: &Invocation) -> Result<Child> {
    cmd.spawn()
        .map_err(|e| Error::External(format!("failed to start {}: {e}", inv.program.display())))
}

fn program_name(inv: &Invocation) -> String {
    inv.program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| inv.program.display().to_string())
}

/// Exit code to propagate; signal deaths map to the shell's `128 + signo`.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    1
}

async fn kill_and_reap(child: &mut Child) -> Result<()> {
    // If it's already exited, `try_wait` reaps it.
    if child.try_wait()?.is_some() {
        return Ok(());
    }

    match child.kill().await {
        Ok(()) => Ok(()),
        Err(e) => {
            // Exited between `try_wait` and `kill`.
            if child.try_wait()?.is_some() {
                return Ok(());
            }
            Err(Error::Io(e))
        }
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    fn locate(&self, program: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
        which_in_path(program, search_path)
    }

    async fn output(&self, inv: &Invocation, timeout: Option<Duration>) -> Result<ProcessOutput> {
        let mut cmd = command(inv);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = spawn(cmd, inv)?;
        let name = program_name(inv);

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::External(format!("{name} stdout was not captured")))?;
        let stderr = child.stderr.take();
        let stderr_tail: Arc<Mutex<StderrTail>> = Arc::new(Mutex::new(StderrTail::default()));

        // Drain both pipes in background to avoid blocking on a full pipe.
        let stderr_task = stderr.map(|stderr| {
            let tail = stderr_tail.clone();
            let name = name.clone();
            tokio::spawn(async move {
                let mut r = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tracing::debug!(program = %name, "{line}");
                    tail.lock().await.push_line(line);
                }
            })
        });
        let stdout_task = {
            let name = name.clone();
            tokio::spawn(async move {
                let mut buf = String::new();
                let mut r = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = r.next_line().await {
                    tracing::debug!(program = %name, "{line}");
                    buf.push_str(&line);
                    buf.push('\n');
                }
                buf
            })
        };

        let status = match self.wait(&mut child, timeout).await? {
            Waited::Exited(status) => status,
            Waited::Cancelled => {
                kill_and_reap(&mut child).await?;
                return Err(Error::External(format!("{name} was cancelled")));
            }
            Waited::TimedOut(after) => {
                kill_and_reap(&mut child).await?;
                return Err(Error::External(format!(
                    "{name} timed out after {}s",
                    after.as_secs_f64()
                )));
            }
        };

        let stdout = stdout_task
            .await
            .map_err(|e| Error::External(format!("{name} stdout reader failed: {e}")))?;
        if let Some(task) = stderr_task {
            let _ = task.await;
        }
        let stderr = stderr_tail.lock().await.snapshot();

        Ok(ProcessOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }

    async fn launch(&self, inv: &Invocation) -> Result<i32> {
        let mut cmd = command(inv);
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let mut child = spawn(cmd, inv)?;
        if let Some(pid) = child.id() {
            tracing::info!(pid, "bot started");
        }

        match self.wait(&mut child, None).await? {
            Waited::Exited(status) => Ok(exit_code(status)),
            Waited::Cancelled | Waited::TimedOut(_) => {
                tracing::info!("interrupt received; stopping bot");
                let code = self.stop_gracefully(&mut child).await?;
                tracing::info!(code, "bot stopped");
                Ok(code)
            }
        }
    }
}

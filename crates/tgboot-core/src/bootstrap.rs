//! The bootstrap pipeline: a linear chain of gates ending in the bot launch.

use std::{sync::Arc, time::SystemTime};

use crate::{
    cleanup::prune_older_than,
    config::Config,
    deps::install_requirements,
    domain::{LOGS_DIR, SCREENSHOTS_DIR, SESSIONS_DIR},
    env_file,
    interpreter,
    launch::build_launch,
    layout::provision_work_dirs,
    locks::sweep_stale_locks,
    ports::{Filesystem, Invocation, ProcessRunner},
    report::{write_report, BootstrapReport, DirStatus},
    venv, Result,
};

pub struct Bootstrapper {
    cfg: Arc<Config>,
    fs: Arc<dyn Filesystem>,
    runner: Arc<dyn ProcessRunner>,
}

impl Bootstrapper {
    pub fn new(cfg: Arc<Config>, fs: Arc<dyn Filesystem>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { cfg, fs, runner }
    }

    /// Prepare everything, then launch the bot once and return its exit code.
    pub async fn run(&self) -> Result<i32> {
        let mut report = BootstrapReport::new(&self.cfg.work_dir);

        let launch = match self.prepare(&mut report).await {
            Ok(inv) => inv,
            Err(e) => {
                report.fail(&e);
                self.persist(&report);
                return Err(e);
            }
        };

        report.launched(None);
        self.persist(&report);

        tracing::info!(cmd = %launch.display(), "launching bot");
        match self.runner.launch(&launch).await {
            Ok(code) => {
                if code == 0 {
                    tracing::info!("bot exited cleanly");
                } else {
                    tracing::warn!(code, "bot exited with non-zero status");
                }
                report.launched(Some(code));
                self.persist(&report);
                Ok(code)
            }
            Err(e) => {
                report.fail(&e);
                self.persist(&report);
                Err(e)
            }
        }
    }

    /// Run every gate and setup step, returning the launch invocation.
    pub async fn prepare(&self, report: &mut BootstrapReport) -> Result<Invocation> {
        let cfg = &self.cfg;
        let fs = self.fs.as_ref();
        let runner = self.runner.as_ref();
        let search_path = cfg.search_path.as_deref();

        // 1-2. Interpreter.
        let python = interpreter::locate(runner, &cfg.python, search_path)?;
        report.interpreter = Some(python.clone());
        let version = interpreter::probe_version(runner, &python, &cfg.work_dir).await?;
        report.python_version = Some(version);
        interpreter::check_version(version, cfg.min_python)?;
        tracing::info!(python = %python.display(), %version, "python interpreter ok");

        // 3. Isolated environment.
        let (env, venv_status) =
            venv::provision(fs, runner, &python, &cfg.venv_dir, &cfg.work_dir).await?;
        report.venv = Some(venv_status);

        // 4. Working directories.
        for (path, status) in provision_work_dirs(fs, &cfg.work_dir)? {
            tracing::debug!(dir = %path.display(), ?status, "working directory");
            report.dirs.push(DirStatus { path, status });
        }

        // 5-6. Configuration file.
        let config = env_file::check(fs, &cfg.env_file)?;
        for warning in env_file::lint(&config) {
            tracing::warn!(file = %cfg.env_file.display(), "{warning}");
            report.warnings.push(warning);
        }

        // 7. Dependencies.
        install_requirements(
            fs,
            runner,
            &env,
            &cfg.requirements,
            &cfg.work_dir,
            search_path,
            cfg.install_timeout,
        )
        .await?;
        tracing::info!("dependencies installed");

        // 8. Stale locks, then old screenshots.
        let sweep = sweep_stale_locks(fs, &cfg.work_dir.join(SESSIONS_DIR), cfg.force_lock_cleanup)?;
        tracing::info!(
            removed = sweep.removed.len(),
            held = sweep.held.len(),
            unreadable = sweep.unreadable.len(),
            "session locks cleaned"
        );
        report.locks = sweep;

        if let Some(max_age) = cfg.screenshot_max_age {
            let pruned = prune_older_than(
                fs,
                &cfg.work_dir.join(SCREENSHOTS_DIR),
                max_age,
                SystemTime::now(),
            )?;
            report.screenshots_pruned = pruned.removed.len();
        }

        if !fs.exists(&cfg.bot_script) {
            let warning = format!("bot program {} does not exist", cfg.bot_script.display());
            tracing::warn!("{warning}");
            report.warnings.push(warning);
        }

        Ok(build_launch(
            &env,
            &cfg.bot_script,
            &cfg.work_dir,
            search_path,
            &config,
            |key| std::env::var_os(key).is_some(),
        ))
    }

    fn persist(&self, report: &BootstrapReport) {
        let logs = self.cfg.work_dir.join(LOGS_DIR);
        if !self.fs.is_dir(&logs) {
            return;
        }
        if let Err(e) = write_report(self.fs.as_ref(), &logs, report) {
            tracing::warn!(error = %e, "failed to write bootstrap report");
        }
    }
}

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use tgboot_core::{bootstrap::Bootstrapper, config::Config, ports::OsFilesystem};
use tgboot_process::TokioProcessRunner;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    tgboot_core::logging::init("tgboot")?;

    let cfg = Arc::new(Config::load().context("invalid bootstrap settings")?);
    tracing::info!(work_dir = %cfg.work_dir.display(), "bootstrapping bot environment");

    // Ctrl-C stops whatever child is running (pip or the bot) and reaps it.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let bootstrapper = Bootstrapper::new(
        cfg,
        Arc::new(OsFilesystem),
        Arc::new(TokioProcessRunner::new(cancel)),
    );

    Ok(bootstrapper.run().await?)
}

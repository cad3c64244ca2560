use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Filter used when `RUST_LOG` is unset: `info` for the bootstrapper's own
/// crates, `warn` for dependencies.
pub fn default_filter(service_name: &str) -> String {
    format!("warn,tgboot_core=info,tgboot_process=info,{service_name}=info")
}

/// Initialize tracing for the bootstrapper.
///
/// Logs go to stderr so the launched bot keeps stdout to itself.
pub fn init(service_name: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(service_name)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("failed to install log subscriber: {e}")))
}

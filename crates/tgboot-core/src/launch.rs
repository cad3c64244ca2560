use std::{ffi::OsStr, path::Path};

use crate::{domain::ActiveEnv, env_file::EnvFile, ports::Invocation, venv::activated_invocation};

/// The bot invocation: venv python running `script` from `work_dir`.
///
/// Values from the configuration file are passed explicitly; anything already
/// present in the inherited environment (`is_inherited`) wins.
pub fn build_launch(
    env: &ActiveEnv,
    script: &Path,
    work_dir: &Path,
    inherited_path: Option<&OsStr>,
    config: &EnvFile,
    is_inherited: impl Fn(&str) -> bool,
) -> Invocation {
    let from_file = config
        .entries
        .iter()
        .filter(|(k, _)| !is_inherited(k.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    activated_invocation(env, work_dir, inherited_path)
        .envs(from_file)
        .arg(script.to_string_lossy())
}

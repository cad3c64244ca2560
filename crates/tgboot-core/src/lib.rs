//! Core of the Telegram bot bootstrapper.
//!
//! Every step (interpreter gate, venv, working dirs, `.env` gate, dependency
//! install, lock cleanup, launch) is a plain function over two ports:
//! [`ports::Filesystem`] and [`ports::ProcessRunner`]. The tokio process adapter
//! lives in `tgboot-process`.

pub mod bootstrap;
pub mod cleanup;
pub mod config;
pub mod deps;
pub mod domain;
pub mod env_file;
pub mod errors;
pub mod interpreter;
pub mod launch;
pub mod layout;
pub mod locks;
pub mod logging;
pub mod ports;
pub mod report;
pub mod utils;
pub mod venv;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};

//! The bot's `.env` configuration file.
//!
//! Completeness is a textual check on key names (the gate); parsing only feeds
//! warnings and the launch environment.

use std::path::{Path, PathBuf};

use crate::{domain::REQUIRED_KEYS, errors::Error, ports::Filesystem, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvFile {
    pub path: PathBuf,
    pub entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Keys from `required` that do not occur anywhere in `text`.
pub fn missing_keys(text: &str, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|k| !text.contains(**k))
        .map(|k| k.to_string())
        .collect()
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, an
/// `export ` prefix is tolerated and one pair of surrounding quotes is stripped.
pub fn parse_env_text(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }

        out.push((key.to_string(), val.to_string()));
    }
    out
}

/// Gate the configuration file: it must exist and mention every required key.
pub fn check(fs: &dyn Filesystem, path: &Path) -> Result<EnvFile> {
    if !fs.exists(path) {
        return Err(Error::MissingConfig(path.to_path_buf()));
    }

    let text = fs.read_to_string(path)?;
    let missing = missing_keys(&text, &REQUIRED_KEYS);
    if !missing.is_empty() {
        return Err(Error::IncompleteConfig {
            path: path.to_path_buf(),
            missing,
        });
    }

    Ok(EnvFile {
        path: path.to_path_buf(),
        entries: parse_env_text(&text),
    })
}

/// Problems the bot will trip over at startup that the textual gate lets through.
pub fn lint(file: &EnvFile) -> Vec<String> {
    let mut warnings = Vec::new();

    for key in REQUIRED_KEYS {
        match file.get(key) {
            None => warnings.push(format!("{key} is mentioned but never assigned")),
            Some(v) if v.trim().is_empty() => warnings.push(format!("{key} is empty")),
            Some(_) => {}
        }
    }

    if let Some(id) = file.get("API_ID") {
        let id = id.trim();
        if !id.is_empty() && id.parse::<i64>().is_err() {
            warnings.push(format!("API_ID should be an integer, got {id:?}"));
        }
    }

    warnings
}

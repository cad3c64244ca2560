use std::{
    env,
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
};

use chrono::Utc;

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/reports).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Text Helpers ==============

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== Path Helpers ==============

/// Resolve `binary` the way a shell would.
///
/// Anything containing a path separator is taken as a path and only checked for
/// executability; bare names are searched in `search_path`.
pub fn which_in_path(binary: &str, search_path: Option<&OsStr>) -> Option<PathBuf> {
    let as_path = Path::new(binary);
    if as_path.components().count() > 1 {
        return is_executable_file(as_path).then(|| as_path.to_path_buf());
    }

    let path = search_path?;
    for dir in env::split_paths(path) {
        let candidate = dir.join(binary);
        if is_executable_file(&candidate) {
            return Some(candidate);
        }
        #[cfg(windows)]
        {
            let exe = candidate.with_extension("exe");
            if is_executable_file(&exe) {
                return Some(exe);
            }
        }
    }
    None
}

pub fn is_executable_file(p: &Path) -> bool {
    if !p.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(md) = fs::metadata(p) {
            return (md.permissions().mode() & 0o111) != 0;
        }
    }
    true
}

/// Join `raw` onto `base` (unless absolute) and fold `.`/`..` without touching the
/// filesystem, so paths that do not exist yet still come out clean.
pub fn resolve_against(base: &Path, raw: &Path) -> PathBuf {
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        base.join(raw)
    };

    let mut out = PathBuf::new();
    for comp in joined.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

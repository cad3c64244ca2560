use std::path::{Path, PathBuf};

use crate::{
    domain::{Provisioned, WORK_DIRS},
    errors::Error,
    ports::Filesystem,
    Result,
};

/// Create `path` unless it is already a directory.
pub fn ensure_dir(fs: &dyn Filesystem, path: &Path) -> Result<Provisioned> {
    if fs.is_dir(path) {
        return Ok(Provisioned::AlreadyPresent);
    }
    if fs.exists(path) {
        return Err(Error::InvalidPath {
            path: path.to_path_buf(),
            reason: "exists but is not a directory".to_string(),
        });
    }
    fs.create_dir_all(path)?;
    Ok(Provisioned::Created)
}

/// Ensure the bot's working directories under `work_dir`.
pub fn provision_work_dirs(
    fs: &dyn Filesystem,
    work_dir: &Path,
) -> Result<Vec<(PathBuf, Provisioned)>> {
    WORK_DIRS
        .iter()
        .map(|name| {
            let path = work_dir.join(name);
            let status = ensure_dir(fs, &path)?;
            Ok((path, status))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeFs;

    #[test]
    fn ensure_dir_is_idempotent() {
        let fs = FakeFs::default();
        let p = Path::new("/srv/bot/logs");
        assert_eq!(ensure_dir(&fs, p).unwrap(), Provisioned::Created);
        assert_eq!(ensure_dir(&fs, p).unwrap(), Provisioned::AlreadyPresent);
        assert_eq!(fs.created_dirs(), vec![p.to_path_buf()]);
    }

    #[test]
    fn ensure_dir_refuses_to_shadow_a_file() {
        let fs = FakeFs::default();
        fs.add_file("/srv/bot/sessions", "oops");
        let err = ensure_dir(&fs, Path::new("/srv/bot/sessions")).unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn work_dirs_are_created_once() {
        let fs = FakeFs::default();
        fs.add_dir("/srv/bot");
        fs.add_dir("/srv/bot/logs");

        let first = provision_work_dirs(&fs, Path::new("/srv/bot")).unwrap();
        assert_eq!(
            first,
            vec![
                (PathBuf::from("/srv/bot/logs"), Provisioned::AlreadyPresent),
                (PathBuf::from("/srv/bot/sessions"), Provisioned::Created),
                (
                    PathBuf::from("/srv/bot/captcha_screenshots"),
                    Provisioned::Created
                ),
            ]
        );

        let second = provision_work_dirs(&fs, Path::new("/srv/bot")).unwrap();
        assert!(second
            .iter()
            .all(|(_, s)| *s == Provisioned::AlreadyPresent));
    }
}

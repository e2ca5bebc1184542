// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symbolic link management with backup-before-overwrite.
//!
//! Linking never destroys user data. Whatever real file or directory sits at
//! a link destination is moved aside to a `.backup` name first. Only stale
//! symlinks are replaced outright, since they hold nothing worth keeping.

use std::{
    fs, io,
    os::unix::fs::symlink,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// What happened at a link destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Destination already pointed at source.
    AlreadyLinked,

    /// Nothing was at destination, link created.
    Created,

    /// Stale symlink at destination replaced.
    Replaced,

    /// Existing file moved to given backup path, then link created.
    BackedUp(PathBuf),
}

/// Check whether `dest` is a symlink pointing at `source`.
pub fn is_linked(source: &Path, dest: &Path) -> bool {
    fs::read_link(dest).is_ok_and(|target| target == source)
}

/// First unused backup name for `dest`.
///
/// Tries `<dest>.backup`, then `<dest>.backup.1`, `<dest>.backup.2`, and so on.
pub fn backup_path(dest: &Path) -> PathBuf {
    let base = dest.as_os_str().to_os_string();
    let mut candidate = base.clone();
    candidate.push(".backup");

    let mut index = 1;
    while fs::symlink_metadata(&candidate).is_ok() {
        candidate = base.clone();
        candidate.push(format!(".backup.{index}"));
        index += 1;
    }

    PathBuf::from(candidate)
}

/// Link `dest` to `source`, backing up whatever real file is in the way.
///
/// # Errors
///
/// - Return [`LinkError::MissingSource`] if `source` does not exist.
/// - Return [`LinkError::Io`] if any filesystem operation fails.
pub fn link_with_backup(source: &Path, dest: &Path) -> Result<LinkOutcome> {
    if fs::symlink_metadata(source).is_err() {
        return Err(LinkError::MissingSource(source.to_path_buf()));
    }

    if is_linked(source, dest) {
        debug!("{:?} already linked", dest.display());
        return Ok(LinkOutcome::AlreadyLinked);
    }

    let outcome = match fs::symlink_metadata(dest) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::remove_file(dest).map_err(|source| io_error(dest, source))?;
            LinkOutcome::Replaced
        }
        Ok(_) => {
            let backup = backup_path(dest);
            info!("back up {:?} to {:?}", dest.display(), backup.display());
            fs::rename(dest, &backup).map_err(|source| io_error(dest, source))?;
            LinkOutcome::BackedUp(backup)
        }
        Err(_) => LinkOutcome::Created,
    };

    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent).map_err(|source| io_error(parent, source))?;
    }
    symlink(source, dest).map_err(|source| io_error(dest, source))?;
    info!("link {:?} -> {:?}", dest.display(), source.display());

    Ok(outcome)
}

fn io_error(path: &Path, source: io::Error) -> LinkError {
    LinkError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Link error types.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Link source does not exist.
    #[error("link source {:?} does not exist", .0.display())]
    MissingSource(PathBuf),

    /// Filesystem operation failed.
    #[error("failed to link at {:?}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LinkError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    fn absolute(path: &str) -> PathBuf {
        std::env::current_dir().unwrap().join(path)
    }

    #[sealed_test]
    fn creates_missing_link() -> anyhow::Result<()> {
        fs::write("zshrc", "export EDITOR=vim\n")?;
        let source = absolute("zshrc");
        let dest = absolute("home/.zshrc");

        assert_eq!(link_with_backup(&source, &dest)?, LinkOutcome::Created);
        assert!(is_linked(&source, &dest));
        assert_eq!(link_with_backup(&source, &dest)?, LinkOutcome::AlreadyLinked);

        Ok(())
    }

    #[sealed_test]
    fn backs_up_existing_files_without_discarding_them() -> anyhow::Result<()> {
        fs::write("zshrc", "new\n")?;
        fs::write(".zshrc", "old\n")?;
        fs::write(".zshrc.backup", "older\n")?;
        let source = absolute("zshrc");
        let dest = absolute(".zshrc");

        let outcome = link_with_backup(&source, &dest)?;
        assert_eq!(outcome, LinkOutcome::BackedUp(absolute(".zshrc.backup.1")));
        assert_eq!(fs::read_to_string(".zshrc.backup.1")?, "old\n");
        assert_eq!(fs::read_to_string(".zshrc.backup")?, "older\n");
        assert_eq!(fs::read_to_string(".zshrc")?, "new\n");

        Ok(())
    }

    #[sealed_test]
    fn replaces_stale_symlink() -> anyhow::Result<()> {
        fs::write("zshrc", "new\n")?;
        fs::write("elsewhere", "other\n")?;
        symlink(absolute("elsewhere"), absolute(".zshrc"))?;

        let outcome = link_with_backup(&absolute("zshrc"), &absolute(".zshrc"))?;
        assert_eq!(outcome, LinkOutcome::Replaced);
        assert!(!Path::new(".zshrc.backup").exists());
        assert_eq!(fs::read_to_string("elsewhere")?, "other\n");

        Ok(())
    }
}

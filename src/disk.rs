// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Free disk space precondition.

use crate::system::{System, SystemError};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Ensure filesystem that will hold `path` has at least `required` bytes free.
///
/// The target path usually does not exist yet, so free space is queried on
/// its nearest existing ancestor.
///
/// # Errors
///
/// - Return [`DiskError::NoExistingAncestor`] if no ancestor of `path` exists.
/// - Return [`DiskError::Query`] if free space cannot be queried.
/// - Return [`DiskError::Insufficient`] if there is not enough free space.
pub fn ensure_space(system: &dyn System, path: &Path, required: u64) -> Result<u64> {
    let anchor = nearest_existing_ancestor(path)
        .ok_or_else(|| DiskError::NoExistingAncestor(path.to_path_buf()))?;
    let available = system.available_space(&anchor)?;
    debug!(
        "{available} bytes free at {:?}, {required} bytes required",
        anchor.display()
    );

    if available < required {
        return Err(DiskError::Insufficient {
            path: anchor,
            required,
            available,
        });
    }

    Ok(available)
}

/// First ancestor of `path`, starting with `path` itself, that exists.
pub fn nearest_existing_ancestor(path: &Path) -> Option<PathBuf> {
    path.ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .find(|ancestor| ancestor.exists())
        .map(Path::to_path_buf)
}

/// Disk space error types.
#[derive(Debug, thiserror::Error)]
pub enum DiskError {
    /// Not enough free space.
    #[error(
        "not enough free space at {:?}: {required} bytes required, {available} bytes available",
        path.display()
    )]
    Insufficient {
        path: PathBuf,
        required: u64,
        available: u64,
    },

    /// Neither path nor any of its ancestors exist.
    #[error("no existing ancestor of {:?}", .0.display())]
    NoExistingAncestor(PathBuf),

    /// Free space query failed.
    #[error(transparent)]
    Query(#[from] SystemError),
}

/// Friendly result alias :3
pub type Result<T, E = DiskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{Invocation, Output};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct FixedSpace {
        available: u64,
        queried: RefCell<Vec<PathBuf>>,
    }

    impl System for FixedSpace {
        fn run(&self, _: &Invocation) -> crate::system::Result<Output> {
            Ok(Output::ok(""))
        }

        fn run_interactive(&self, _: &Invocation) -> crate::system::Result<bool> {
            Ok(true)
        }

        fn which(&self, _: &str) -> Option<PathBuf> {
            None
        }

        fn available_space(&self, path: &Path) -> crate::system::Result<u64> {
            self.queried.borrow_mut().push(path.to_path_buf());
            Ok(self.available)
        }
    }

    #[test]
    fn queries_nearest_existing_ancestor() -> anyhow::Result<()> {
        let system = FixedSpace {
            available: 4096,
            queried: RefCell::default(),
        };
        let target = std::env::temp_dir().join("zorin-setup-missing/fonts/Hack");
        ensure_space(&system, &target, 1024)?;
        assert_eq!(system.queried.borrow().as_slice(), [std::env::temp_dir()]);

        Ok(())
    }

    #[test]
    fn insufficient_space_fails() {
        let system = FixedSpace {
            available: 10,
            queried: RefCell::default(),
        };
        let result = ensure_space(&system, &std::env::temp_dir(), 100);
        assert!(matches!(
            result,
            Err(DiskError::Insufficient {
                required: 100,
                available: 10,
                ..
            })
        ));
    }
}

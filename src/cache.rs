// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Download cache.
//!
//! Previously fetched artifacts are kept on disk keyed by the file name of
//! their destination. A present and non-empty entry is treated the same as a
//! fresh download. Entries never expire. They are only removed when the cache
//! is cleared, or when a step finds a cached artifact corrupt.

use crate::path::is_plain_file_name;

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// File name keyed cache of downloaded artifacts.
#[derive(Debug, Clone)]
pub struct DownloadCache {
    root: PathBuf,
}

impl DownloadCache {
    /// Construct new cache rooted at target directory.
    ///
    /// The directory is created lazily on first store.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`.
    ///
    /// # Errors
    ///
    /// - Return [`CacheError::InvalidKey`] if key is not a plain file name.
    pub fn entry(&self, key: &str) -> Result<PathBuf> {
        if !is_plain_file_name(key) || key.ends_with(".partial") {
            return Err(CacheError::InvalidKey(key.into()));
        }

        Ok(self.root.join(key))
    }

    /// Check whether a usable entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entry(key)
            .ok()
            .and_then(|path| fs::metadata(path).ok())
            .is_some_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// Copy cached entry for `key` to `dest`.
    ///
    /// Returns `false` without touching `dest` if there is no usable entry.
    ///
    /// # Errors
    ///
    /// - Return [`CacheError::InvalidKey`] if key is not a plain file name.
    /// - Return [`CacheError::Io`] if entry cannot be copied.
    pub fn restore(&self, key: &str, dest: &Path) -> Result<bool> {
        let entry = self.entry(key)?;
        if !self.contains(key) {
            return Ok(false);
        }

        debug!("restore {:?} from cache", dest.display());
        create_parent(dest)?;
        fs::copy(&entry, dest).map_err(|source| CacheError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        Ok(true)
    }

    /// Store bytes under `key`.
    ///
    /// Bytes are written to a temporary file in the cache directory first, then
    /// renamed into place, so an interrupted write never leaves a truncated
    /// entry behind.
    ///
    /// # Errors
    ///
    /// - Return [`CacheError::InvalidKey`] if key is not a plain file name.
    /// - Return [`CacheError::Io`] if entry cannot be written.
    pub fn store(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let entry = self.entry(key)?;
        mkdirp::mkdirp(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;

        let partial = self.root.join(format!("{key}.partial"));
        let io_error = |source| CacheError::Io {
            path: partial.clone(),
            source,
        };
        let mut file = fs::File::create(&partial).map_err(io_error)?;
        file.write_all(bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        drop(file);

        fs::rename(&partial, &entry).map_err(|source| CacheError::Io {
            path: entry.clone(),
            source,
        })?;
        debug!("cached {} bytes as {key:?}", bytes.len());

        Ok(entry)
    }

    /// Remove entry for `key`, if any.
    ///
    /// # Errors
    ///
    /// - Return [`CacheError::InvalidKey`] if key is not a plain file name.
    /// - Return [`CacheError::Io`] if entry cannot be removed.
    pub fn evict(&self, key: &str) -> Result<()> {
        let entry = self.entry(key)?;
        match fs::remove_file(&entry) {
            Ok(()) => {
                debug!("evicted {key:?} from cache");
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: entry,
                source,
            }),
        }
    }

    /// Remove every entry.
    ///
    /// Clearing a cache that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`CacheError::Io`] if cache directory cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {
                info!("cleared download cache {:?}", self.root.display());
                Ok(())
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.root.clone(),
                source,
            }),
        }
    }
}

pub(crate) fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp::mkdirp(parent).map_err(|source| CacheError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    Ok(())
}

/// Download cache error types.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Cache key is not usable as a single file name.
    #[error("invalid cache key {0:?}")]
    InvalidKey(String),

    /// Cache entry cannot be read or written.
    #[error("cache I/O failed at {:?}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

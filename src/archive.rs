// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Zip archive extraction.

use std::{
    fs::File,
    path::{Path, PathBuf},
};
use tracing::info;
use zip::ZipArchive;

/// Extract every entry of zip archive at `archive` into `dest`.
///
/// Entries whose names would escape `dest` are refused by the zip reader.
///
/// # Errors
///
/// - Return [`ArchiveError::Open`] if archive cannot be opened.
/// - Return [`ArchiveError::Zip`] if archive is malformed or cannot be written
///   out.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|source| ArchiveError::Open {
        path: archive.to_path_buf(),
        source,
    })?;
    let zip_error = |source| ArchiveError::Zip {
        path: archive.to_path_buf(),
        source,
    };

    let mut zip = ZipArchive::new(file).map_err(zip_error)?;
    let entries = zip.len();
    mkdirp::mkdirp(dest).map_err(|source| ArchiveError::Open {
        path: dest.to_path_buf(),
        source,
    })?;
    zip.extract(dest).map_err(zip_error)?;
    info!(
        "extracted {entries} entries from {:?} into {:?}",
        archive.display(),
        dest.display()
    );

    Ok(entries)
}

/// Archive error types.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("failed to open {:?}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to extract {:?}", path.display())]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ArchiveError> = std::result::Result<T, E>;

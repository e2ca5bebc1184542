// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! SHA-256 verification of downloaded artifacts.

use sha2::{Digest, Sha256};
use std::{
    fs::File,
    io::{self, BufReader, Read},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Result of verifying a file against an expected digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// No digest was expected, nothing was checked.
    Skipped,

    /// File matches expected digest.
    Matched,
}

/// Hex encoded SHA-256 digest of file at `path`.
///
/// # Errors
///
/// - Return [`ChecksumError::Io`] if file cannot be read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let io_error = |source| ChecksumError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify file at `path` against optional expected digest.
///
/// Comparison ignores case and surrounding whitespace of the expected digest.
///
/// # Errors
///
/// - Return [`ChecksumError::Io`] if file cannot be read.
/// - Return [`ChecksumError::Mismatch`] if digests differ.
pub fn verify(path: &Path, expected: Option<&str>) -> Result<Verification> {
    let Some(expected) = expected.map(str::trim).filter(|digest| !digest.is_empty()) else {
        debug!("no checksum for {:?}, skip verification", path.display());
        return Ok(Verification::Skipped);
    };

    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(ChecksumError::Mismatch {
            path: path.to_path_buf(),
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }

    Ok(Verification::Matched)
}

/// Checksum error types.
#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    /// File cannot be read.
    #[error("failed to read {:?} for hashing", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File does not match expected digest.
    #[error("checksum mismatch for {:?}: expected {expected}, got {actual}", path.display())]
    Mismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ChecksumError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run context shared by every step.

use crate::{
    download::Downloader, packages::PackageIndex, path::under_home, report::Reporter,
    system::System,
};

use std::path::{Path, PathBuf};

/// Mutable state of a single run.
///
/// Everything a step may touch is reachable from here, so steps never reach
/// for globals.
pub struct Context<'run> {
    pub system: &'run dyn System,
    pub downloader: &'run Downloader,
    pub packages: PackageIndex,
    pub reporter: Reporter,
    user: String,
    home: PathBuf,
    staging: PathBuf,
}

impl<'run> Context<'run> {
    /// Construct new run context.
    ///
    /// Staging files for privileged installs are kept in a `staging`
    /// directory beside the download cache.
    pub fn new(
        system: &'run dyn System,
        downloader: &'run Downloader,
        user: impl Into<String>,
        home: impl Into<PathBuf>,
        reporter: Reporter,
    ) -> Self {
        let staging = downloader.cache().root().join("staging");
        Self {
            system,
            downloader,
            packages: PackageIndex::new(),
            reporter,
            user: user.into(),
            home: home.into(),
            staging,
        }
    }

    /// Name of user being set up.
    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Resolve home-relative path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        under_home(&self.home, path)
    }

    /// Path of staging file with given name.
    pub fn staging_file(&self, name: &str) -> PathBuf {
        self.staging.join(name)
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Context")
            .field("packages", &self.packages)
            .field("user", &self.user)
            .field("home", &self.home)
            .field("staging", &self.staging)
            .finish_non_exhaustive()
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package manager plumbing.
//!
//! Thin wrappers around `apt-get`, `dpkg-query`, and `snap`. Detection helpers
//! never fail, anything that goes wrong while asking the package manager is
//! treated as the package being absent.

use crate::system::{Invocation, System, SystemError};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, info, instrument, warn};

/// Memoized package index refresh.
///
/// The package index only needs to be refreshed once per run, unless a new
/// package source was registered in the meantime.
#[derive(Debug, Default, Clone)]
pub struct PackageIndex {
    fresh: bool,
    refreshes: u32,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refresh package index.
    ///
    /// Does nothing if index was already refreshed during this run, unless
    /// `force` is set.
    ///
    /// # Errors
    ///
    /// - Return [`PackageError::System`] if `apt-get update` fails.
    #[instrument(skip(self, system), level = "debug")]
    pub fn refresh(&mut self, system: &dyn System, force: bool) -> Result<()> {
        if self.fresh && !force {
            debug!("package index already fresh");
            return Ok(());
        }

        info!("refresh package index");
        system.run_checked(&Invocation::new("apt-get").arg("update").privileged())?;
        self.fresh = true;
        self.refreshes += 1;

        Ok(())
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Number of refreshes actually performed.
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }
}

/// How to treat a batch where some items fail.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Attempt every item, report all failures at the end.
    #[default]
    Continue,

    /// Stop at first failure.
    Abort,
}

/// Apply `action` to every item under given partial success policy.
///
/// # Errors
///
/// - Return [`PackageError::Partial`] listing every item that failed.
pub fn for_each_with_policy<T: Display>(
    items: &[T],
    policy: PartialPolicy,
    mut action: impl FnMut(&T) -> Result<()>,
) -> Result<()> {
    let mut failed = Vec::new();
    for item in items {
        if let Err(error) = action(item) {
            warn!("{item}: {error}");
            failed.push(item.to_string());
            if policy == PartialPolicy::Abort {
                break;
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(PackageError::Partial {
            failed: FailedItems(failed),
        })
    }
}

/// Check whether apt package is installed.
pub fn is_installed(system: &dyn System, package: &str) -> bool {
    let invocation = Invocation::new("dpkg-query").args(["-W", "-f=${Status}", package]);
    let installed = system
        .run(&invocation)
        .is_ok_and(|output| output.success && output.stdout.trim() == "install ok installed");
    debug!("package {package} installed: {installed}");
    installed
}

/// Listing of packages that are not installed yet.
pub fn missing(system: &dyn System, packages: &[String]) -> Vec<String> {
    packages
        .iter()
        .filter(|package| !is_installed(system, package))
        .cloned()
        .collect()
}

pub(crate) fn apt_install(package: &str) -> Invocation {
    Invocation::new("apt-get")
        .args(["install", "-y", package])
        .env("DEBIAN_FRONTEND", "noninteractive")
        .privileged()
}

/// Install apt package non-interactively.
///
/// # Errors
///
/// - Return [`PackageError::System`] if `apt-get install` fails.
pub fn install(system: &dyn System, package: &str) -> Result<()> {
    info!("install package {package}");
    system.run_checked(&apt_install(package))?;
    Ok(())
}

/// Install every missing package under given policy.
///
/// # Errors
///
/// - Return [`PackageError::Partial`] listing packages that failed to install.
pub fn install_missing(system: &dyn System, packages: &[String], policy: PartialPolicy) -> Result<()> {
    let missing = missing(system, packages);
    for_each_with_policy(&missing, policy, |package| install(system, package))
}

/// Manual command that installs every given package.
pub fn install_hint(packages: &[String]) -> String {
    format!("sudo apt-get install -y {}", packages.join(" "))
}

/// Check whether snap is installed.
pub fn is_snap_installed(system: &dyn System, name: &str) -> bool {
    system.probe(&Invocation::new("snap").args(["list", name]))
}

pub(crate) fn snap_install(name: &str, classic: bool) -> Invocation {
    let invocation = Invocation::new("snap").args(["install", name]).privileged();
    if classic {
        invocation.arg("--classic")
    } else {
        invocation
    }
}

/// Install snap, in classic confinement if requested.
///
/// # Errors
///
/// - Return [`PackageError::System`] if `snap install` fails.
pub fn install_snap(system: &dyn System, name: &str, classic: bool) -> Result<()> {
    info!("install snap {name}");
    system.run_checked(&snap_install(name, classic))?;
    Ok(())
}

/// Comma separated listing of failed items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItems(pub Vec<String>);

impl Display for FailedItems {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.0.join(", ").as_str())
    }
}

/// Package manager error types.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// Package manager invocation failed.
    #[error(transparent)]
    System(#[from] SystemError),

    /// Some items of a batch failed.
    #[error("failed to install: {failed}")]
    Partial { failed: FailedItems },
}

/// Friendly result alias :3
pub type Result<T, E = PackageError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn continue_policy_attempts_every_item() {
        let mut attempted = Vec::new();
        let result = for_each_with_policy(&["git", "curl", "zsh"], PartialPolicy::Continue, |item| {
            attempted.push(item.to_string());
            match *item {
                "curl" | "zsh" => Err(PackageError::Partial {
                    failed: FailedItems(vec![item.to_string()]),
                }),
                _ => Ok(()),
            }
        });

        assert_eq!(attempted, vec!["git", "curl", "zsh"]);
        match result {
            Err(PackageError::Partial { failed }) => assert_eq!(failed.to_string(), "curl, zsh"),
            other => panic!("expected partial failure, got {other:?}"),
        }
    }

    #[test]
    fn abort_policy_stops_at_first_failure() {
        let mut attempted = Vec::new();
        let result = for_each_with_policy(&["git", "curl", "zsh"], PartialPolicy::Abort, |item| {
            attempted.push(item.to_string());
            match *item {
                "curl" => Err(PackageError::Partial {
                    failed: FailedItems(vec![item.to_string()]),
                }),
                _ => Ok(()),
            }
        });

        assert_eq!(attempted, vec!["git", "curl"]);
        assert!(result.is_err());
    }

    #[test]
    fn snap_install_adds_classic_flag() {
        assert_eq!(snap_install("code", true).to_string(), "sudo snap install code --classic");
        assert_eq!(snap_install("spotify", false).to_string(), "sudo snap install spotify");
    }
}

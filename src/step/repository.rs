// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::RepositoryEntry,
    context::Context,
    packages::{self, PartialPolicy},
    step::{Criticality, Result, Step, StepError},
    system::Invocation,
};

use std::{fs, path::Path};
use tracing::info;

/// Third-party apt repository and the packages it provides.
#[derive(Debug, Clone)]
pub struct AptRepository {
    entry: RepositoryEntry,
}

impl AptRepository {
    pub fn new(entry: RepositoryEntry) -> Self {
        Self { entry }
    }

    fn install_file(staged: &Path, dest: &Path) -> Invocation {
        Invocation::new("install")
            .args(["-D", "-m", "0644"])
            .arg(staged.to_string_lossy())
            .arg(dest.to_string_lossy())
            .privileged()
    }

    fn install_key(&self, ctx: &Context<'_>) -> Result<()> {
        let key = ctx.staging_file(&format!("{}.key", self.entry.name));
        ctx.downloader.download(&self.entry.key_url, &key)?;

        let staged = if self.entry.dearmor {
            let dearmored = ctx.staging_file(&format!("{}.gpg", self.entry.name));
            ctx.system.run_checked(&Invocation::new("gpg").args([
                "--batch".to_string(),
                "--yes".to_string(),
                "--dearmor".to_string(),
                "-o".to_string(),
                dearmored.to_string_lossy().into_owned(),
                key.to_string_lossy().into_owned(),
            ]))?;
            dearmored
        } else {
            key
        };

        info!("install signing key {:?}", self.entry.keyring.display());
        ctx.system
            .run_checked(&Self::install_file(&staged, &self.entry.keyring))?;

        Ok(())
    }

    fn install_source(&self, ctx: &Context<'_>) -> Result<()> {
        let staged = ctx.staging_file(&format!("{}.list", self.entry.name));
        if let Some(parent) = staged.parent() {
            mkdirp::mkdirp(parent).map_err(|source| StepError::io(parent, source))?;
        }
        fs::write(&staged, format!("{}\n", self.entry.source.trim()))
            .map_err(|source| StepError::io(&staged, source))?;

        info!("register package source {:?}", self.entry.list_file.display());
        ctx.system
            .run_checked(&Self::install_file(&staged, &self.entry.list_file))?;

        Ok(())
    }
}

impl Step for AptRepository {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn kind(&self) -> &'static str {
        "apt-repository"
    }

    fn criticality(&self) -> Criticality {
        Criticality::from_required(self.entry.required)
    }

    fn gate(&self) -> Option<&str> {
        self.entry.gate.as_deref()
    }

    fn summary(&self) -> String {
        format!("{} from {}", self.entry.packages.join(", "), self.entry.source)
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.entry
            .packages
            .iter()
            .all(|package| packages::is_installed(ctx.system, package))
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        self.install_key(ctx)?;
        self.install_source(ctx)?;

        // INVARIANT: New source is invisible to apt until index is refreshed.
        ctx.packages.refresh(ctx.system, true)?;
        packages::install_missing(ctx.system, &self.entry.packages, PartialPolicy::Continue)?;

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        let fetch_key = if self.entry.dearmor {
            format!(
                "curl -fsSL {} | gpg --dearmor | sudo tee {} > /dev/null",
                self.entry.key_url,
                self.entry.keyring.display()
            )
        } else {
            format!(
                "curl -fsSL {} | sudo tee {} > /dev/null",
                self.entry.key_url,
                self.entry.keyring.display()
            )
        };

        Some(format!(
            "{fetch_key} && echo '{}' | sudo tee {} && sudo apt-get update && {}",
            self.entry.source.trim(),
            self.entry.list_file.display(),
            packages::install_hint(&self.entry.packages)
        ))
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Step catalog.
//!
//! The run list is assembled in one place from the setup definition, in a
//! fixed order:
//!
//! 1. Base apt packages.
//! 2. Login shell.
//! 3. Installer scripts, one step each.
//! 4. Shell plugins.
//! 5. Third-party apt repositories, one step each.
//! 6. Snap packages.
//! 7. Fonts.
//! 8. Dotfiles.
//! 9. Project directories.
//! 10. Desktop settings.
//! 11. GNOME extensions.
//!
//! Sections missing from the definition produce no step.

use crate::{
    config::SetupDefinition,
    path::is_plain_file_name,
    step::{
        apt::AptPackages,
        desktop::{DesktopSettings, GnomeExtensions},
        dotfiles::Dotfiles,
        fonts::FontArchive,
        plugins::GitPlugins,
        projects::ProjectDirectories,
        repository::AptRepository,
        script::ScriptInstaller,
        shell::LoginShell,
        snap::SnapPackages,
        Criticality, Step, StepDescriptor,
    },
};

use std::collections::HashSet;
use tracing::debug;

/// Ordered, validated listing of steps.
pub struct Catalog {
    steps: Vec<Box<dyn Step>>,
}

impl Catalog {
    /// Build catalog from setup definition.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::DuplicateStep`] if two steps share a name.
    /// - Return [`CatalogError::UnknownGate`] if a step references a gate
    ///   without a question.
    /// - Return [`CatalogError::InvalidName`] if a step name cannot be used as
    ///   a file name.
    /// - Return [`CatalogError::NoMarker`] if an installer has no way to detect
    ///   that it already ran.
    pub fn build(definition: &SetupDefinition) -> Result<Self> {
        let mut steps: Vec<Box<dyn Step>> = Vec::new();

        if let Some(packages) = &definition.packages {
            steps.push(Box::new(AptPackages::new(
                "base-packages",
                packages.names.clone(),
                packages.policy,
                Criticality::Required,
            )));
        }

        if let Some(shell) = &definition.shell {
            steps.push(Box::new(LoginShell::new(shell.clone())));
        }

        for installer in &definition.installers {
            if installer.creates.is_none() && installer.provides.is_none() {
                return Err(CatalogError::NoMarker(installer.name.clone()));
            }
            steps.push(Box::new(ScriptInstaller::new(installer.clone())));
        }

        if !definition.plugins.is_empty() {
            steps.push(Box::new(GitPlugins::new(definition.plugins.clone())));
        }

        for repository in &definition.repositories {
            steps.push(Box::new(AptRepository::new(repository.clone())));
        }

        if !definition.snaps.is_empty() {
            steps.push(Box::new(SnapPackages::new(definition.snaps.clone())));
        }

        if let Some(fonts) = &definition.fonts {
            steps.push(Box::new(FontArchive::new(fonts.clone())));
        }

        if let Some(dotfiles) = &definition.dotfiles {
            steps.push(Box::new(Dotfiles::new(dotfiles.clone())));
        }

        if let Some(projects) = &definition.projects {
            steps.push(Box::new(ProjectDirectories::new(projects.clone())));
        }

        if let Some(desktop) = &definition.desktop {
            if !desktop.settings.is_empty() {
                steps.push(Box::new(DesktopSettings::new(desktop.settings.clone())));
            }

            if !desktop.extensions.is_empty() {
                steps.push(Box::new(GnomeExtensions::new(
                    desktop.registry.as_str(),
                    desktop.extensions.clone(),
                )));
            }
        }

        Self::from_steps(steps, definition)
    }

    /// Validate an already ordered listing of steps.
    ///
    /// # Errors
    ///
    /// - Return [`CatalogError::DuplicateStep`] if two steps share a name.
    /// - Return [`CatalogError::UnknownGate`] if a step references a gate
    ///   without a question.
    /// - Return [`CatalogError::InvalidName`] if a step name cannot be used as
    ///   a file name.
    pub fn from_steps(steps: Vec<Box<dyn Step>>, definition: &SetupDefinition) -> Result<Self> {
        let mut names = HashSet::new();
        for step in &steps {
            // INVARIANT: Step names key staging files, so they must be plain file names.
            if !is_plain_file_name(step.name()) {
                return Err(CatalogError::InvalidName(step.name().into()));
            }

            if !names.insert(step.name().to_string()) {
                return Err(CatalogError::DuplicateStep(step.name().into()));
            }

            if let Some(gate) = step.gate() {
                if !definition.gates.contains_key(gate) {
                    return Err(CatalogError::UnknownGate {
                        step: step.name().into(),
                        gate: gate.into(),
                    });
                }
            }
        }
        debug!("catalog holds {} step(s)", steps.len());

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Box<dyn Step>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Read-only listing of every step, numbered from one.
    pub fn descriptors(&self) -> Vec<StepDescriptor> {
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepDescriptor::of(index + 1, step.as_ref()))
            .collect()
    }
}

/// Catalog error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Step references a gate without a question.
    #[error("step {step:?} references gate {gate:?}, but [gates] has no question for it")]
    UnknownGate { step: String, gate: String },

    /// Two steps share a name.
    #[error("step name {0:?} is used more than once")]
    DuplicateStep(String),

    /// Step name is unusable.
    #[error("step name {0:?} must be a plain file name")]
    InvalidName(String),

    /// Installer cannot detect that it already ran.
    #[error("installer {0:?} needs `creates` or `provides` to detect completion")]
    NoMarker(String),
}

/// Friendly result alias :3
pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::ProjectSection,
    context::Context,
    step::{Criticality, Result, Step, StepError},
};

use tracing::info;

/// Project directory skeleton in the user's home.
#[derive(Debug, Clone)]
pub struct ProjectDirectories {
    section: ProjectSection,
}

impl ProjectDirectories {
    pub fn new(section: ProjectSection) -> Self {
        Self { section }
    }
}

impl Step for ProjectDirectories {
    fn name(&self) -> &str {
        "projects"
    }

    fn kind(&self) -> &'static str {
        "project-directories"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn summary(&self) -> String {
        self.section
            .directories
            .iter()
            .map(|directory| directory.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.section
            .directories
            .iter()
            .all(|directory| ctx.resolve(directory).is_dir())
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        for directory in &self.section.directories {
            let path = ctx.resolve(directory);
            if path.is_dir() {
                continue;
            }

            info!("create {:?}", path.display());
            mkdirp::mkdirp(&path).map_err(|source| StepError::io(&path, source))?;
        }

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        Some(format!("cd ~ && mkdir -p {}", self.summary().replace(", ", " ")))
    }
}

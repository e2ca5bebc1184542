// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    context::Context,
    packages::{self, PartialPolicy},
    step::{Criticality, Result, Step},
};

use tracing::debug;

/// Batch of apt packages.
#[derive(Debug, Clone)]
pub struct AptPackages {
    name: String,
    packages: Vec<String>,
    policy: PartialPolicy,
    criticality: Criticality,
}

impl AptPackages {
    pub fn new(
        name: impl Into<String>,
        packages: Vec<String>,
        policy: PartialPolicy,
        criticality: Criticality,
    ) -> Self {
        Self {
            name: name.into(),
            packages,
            policy,
            criticality,
        }
    }
}

impl Step for AptPackages {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        "apt-packages"
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    fn summary(&self) -> String {
        self.packages.join(", ")
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.packages
            .iter()
            .all(|package| packages::is_installed(ctx.system, package))
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.packages.refresh(ctx.system, false)?;
        let missing = packages::missing(ctx.system, &self.packages);
        debug!("missing packages: {missing:?}");
        packages::for_each_with_policy(&missing, self.policy, |package| {
            packages::install(ctx.system, package)
        })?;

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        Some(packages::install_hint(&self.packages))
    }
}

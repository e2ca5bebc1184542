// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::SnapEntry,
    context::Context,
    packages::{self, PartialPolicy},
    step::{Criticality, Result, Step},
};

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Gate guarding snap installs.
pub const SNAPS_GATE: &str = "snaps";

/// Batch of snap packages.
#[derive(Debug, Clone)]
pub struct SnapPackages {
    snaps: Vec<SnapEntry>,
}

impl SnapPackages {
    pub fn new(snaps: Vec<SnapEntry>) -> Self {
        Self { snaps }
    }
}

impl Display for SnapEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.name)
    }
}

impl Step for SnapPackages {
    fn name(&self) -> &str {
        "snaps"
    }

    fn kind(&self) -> &'static str {
        "snap-packages"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn gate(&self) -> Option<&str> {
        Some(SNAPS_GATE)
    }

    fn summary(&self) -> String {
        self.snaps
            .iter()
            .map(|snap| snap.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.snaps
            .iter()
            .all(|snap| packages::is_snap_installed(ctx.system, &snap.name))
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let missing = self
            .snaps
            .iter()
            .filter(|snap| !packages::is_snap_installed(ctx.system, &snap.name))
            .cloned()
            .collect::<Vec<_>>();
        packages::for_each_with_policy(&missing, PartialPolicy::Continue, |snap| {
            packages::install_snap(ctx.system, &snap.name, snap.classic)
        })?;

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        let commands = self
            .snaps
            .iter()
            .map(|snap| packages::snap_install(&snap.name, snap.classic).to_string())
            .collect::<Vec<_>>();
        Some(commands.join(" && "))
    }
}

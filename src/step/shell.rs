// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::ShellSection,
    context::Context,
    packages,
    step::{Criticality, Result, Step},
    system::{Invocation, System},
};

use std::path::Path;
use tracing::{debug, info};

/// Install shell and make it the user's login shell.
#[derive(Debug, Clone)]
pub struct LoginShell {
    section: ShellSection,
}

impl LoginShell {
    pub fn new(section: ShellSection) -> Self {
        Self { section }
    }

    fn change_shell(&self, user: &str) -> Invocation {
        Invocation::new("chsh")
            .args(["-s", &*self.section.path.to_string_lossy(), user])
            .privileged()
    }
}

/// Login shell of user, the seventh field of its passwd entry.
pub fn login_shell(system: &dyn System, user: &str) -> Option<String> {
    let output = system
        .run(&Invocation::new("getent").args(["passwd", user]))
        .ok()
        .filter(|output| output.success)?;
    let shell = output.stdout.lines().next()?.split(':').nth(6)?.trim().to_string();
    debug!("login shell of {user}: {shell}");
    Some(shell)
}

impl Step for LoginShell {
    fn name(&self) -> &str {
        "shell"
    }

    fn kind(&self) -> &'static str {
        "login-shell"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Required
    }

    fn summary(&self) -> String {
        format!("{} as login shell", self.section.path.display())
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        packages::is_installed(ctx.system, &self.section.package)
            && login_shell(ctx.system, ctx.user())
                .is_some_and(|shell| Path::new(&shell) == self.section.path)
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        if !packages::is_installed(ctx.system, &self.section.package) {
            ctx.packages.refresh(ctx.system, false)?;
            packages::install(ctx.system, &self.section.package)?;
        }

        info!(
            "change login shell of {} to {}",
            ctx.user(),
            self.section.path.display()
        );
        ctx.system.run_checked(&self.change_shell(ctx.user()))?;

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        Some(format!(
            "{} && chsh -s {}",
            packages::install_hint(std::slice::from_ref(&self.section.package)),
            self.section.path.display()
        ))
    }
}

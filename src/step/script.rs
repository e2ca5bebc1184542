// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::InstallerEntry,
    context::Context,
    step::{Criticality, Result, Step},
    system::{Invocation, SystemError},
};

use tracing::{debug, info};

/// Third-party installer script fetched over HTTPS.
#[derive(Debug, Clone)]
pub struct ScriptInstaller {
    entry: InstallerEntry,
}

impl ScriptInstaller {
    pub fn new(entry: InstallerEntry) -> Self {
        Self { entry }
    }

    fn script_name(&self) -> String {
        format!("{}-installer.sh", self.entry.name)
    }

    fn invocation(&self, script: &str) -> Invocation {
        let mut invocation = Invocation::new(self.entry.interpreter.as_str())
            .arg(script)
            .args(self.entry.args.iter().cloned());
        for (key, value) in &self.entry.env {
            invocation = invocation.env(key.as_str(), value.as_str());
        }

        if self.entry.privileged {
            invocation.privileged()
        } else {
            invocation
        }
    }
}

impl Step for ScriptInstaller {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn kind(&self) -> &'static str {
        "script-installer"
    }

    fn criticality(&self) -> Criticality {
        Criticality::from_required(self.entry.required)
    }

    fn summary(&self) -> String {
        self.entry.url.clone()
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        let created = self
            .entry
            .creates
            .as_ref()
            .map(|path| ctx.resolve(path).exists());
        let provided = self
            .entry
            .provides
            .as_ref()
            .map(|command| ctx.system.which(command).is_some());
        debug!("{} marker: created {created:?}, provided {provided:?}", self.entry.name);

        // INVARIANT: Every configured marker must hold, and at least one must exist.
        match (created, provided) {
            (None, None) => false,
            (created, provided) => created.unwrap_or(true) && provided.unwrap_or(true),
        }
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let script = ctx.staging_file(&self.script_name());
        ctx.downloader.download(&self.entry.url, &script)?;

        let invocation = self.invocation(&script.to_string_lossy());
        info!("run installer {}", self.entry.name);
        if !ctx.system.run_interactive(&invocation)? {
            return Err(SystemError::Failed {
                command: invocation.to_string(),
                message: "installer exited unsuccessfully".into(),
            }
            .into());
        }

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        let mut hint = format!("curl -fsSL {} | ", self.entry.url);
        if self.entry.privileged {
            hint.push_str("sudo ");
        }
        hint.push_str(&self.entry.interpreter);
        if !self.entry.args.is_empty() {
            hint.push_str(" -s -- ");
            hint.push_str(&self.entry.args.join(" "));
        }

        Some(hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    #[test]
    fn invocation_passes_arguments_and_environment() {
        let installer = ScriptInstaller::new(InstallerEntry {
            name: "ohmyzsh".into(),
            url: "https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh".into(),
            interpreter: "sh".into(),
            args: vec!["--unattended".into()],
            env: BTreeMap::from([("RUNZSH".to_string(), "no".to_string())]),
            creates: Some(".oh-my-zsh".into()),
            ..Default::default()
        });

        assert_eq!(
            installer.invocation("/tmp/ohmyzsh-installer.sh").to_string(),
            "RUNZSH=no sh /tmp/ohmyzsh-installer.sh --unattended"
        );
        assert_eq!(
            installer.manual_hint().as_deref(),
            Some("curl -fsSL https://raw.githubusercontent.com/ohmyzsh/ohmyzsh/master/tools/install.sh | sh -s -- --unattended")
        );
    }
}

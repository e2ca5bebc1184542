// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    archive,
    config::SettingEntry,
    context::Context,
    desktop::{self, registry::Registry},
    step::{error_chain, Criticality, Result, Step, StepError},
};

use tracing::{debug, info};

/// Gate guarding desktop settings.
pub const DESKTOP_GATE: &str = "desktop";

/// Gate guarding GNOME extension installs.
pub const EXTENSIONS_GATE: &str = "extensions";

/// GNOME settings applied through gsettings.
#[derive(Debug, Clone)]
pub struct DesktopSettings {
    settings: Vec<SettingEntry>,
}

impl DesktopSettings {
    pub fn new(settings: Vec<SettingEntry>) -> Self {
        Self { settings }
    }
}

impl Step for DesktopSettings {
    fn name(&self) -> &str {
        "desktop-settings"
    }

    fn kind(&self) -> &'static str {
        "desktop-settings"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn gate(&self) -> Option<&str> {
        Some(DESKTOP_GATE)
    }

    fn summary(&self) -> String {
        format!("{} gsettings key(s)", self.settings.len())
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.settings
            .iter()
            .all(|entry| desktop::is_setting_applied(ctx.system, entry))
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        for entry in &self.settings {
            if desktop::is_setting_applied(ctx.system, entry) {
                debug!("{} {} already set", entry.schema, entry.key);
                continue;
            }
            desktop::apply_setting(ctx.system, entry)?;
        }

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        let commands = self
            .settings
            .iter()
            .map(|entry| desktop::gsettings_set(entry).to_string())
            .collect::<Vec<_>>();
        Some(commands.join(" && "))
    }
}

/// GNOME Shell extensions fetched from the extension registry.
#[derive(Debug, Clone)]
pub struct GnomeExtensions {
    registry: String,
    uuids: Vec<String>,
}

impl GnomeExtensions {
    pub fn new(registry: impl Into<String>, uuids: Vec<String>) -> Self {
        Self {
            registry: registry.into(),
            uuids,
        }
    }

    fn install(&self, ctx: &Context<'_>, registry: &Registry, major: u32, uuid: &str) -> Result<()> {
        let info = registry.lookup(ctx.downloader, uuid, major)?;
        info!("install extension {} ({uuid})", info.name);

        let archive = ctx.staging_file(&format!("{uuid}.zip"));
        ctx.downloader.download(&registry.download_url(&info), &archive)?;
        archive::extract_zip(&archive, &desktop::extension_dir(ctx.home(), uuid))?;

        Ok(())
    }
}

impl Step for GnomeExtensions {
    fn name(&self) -> &str {
        "gnome-extensions"
    }

    fn kind(&self) -> &'static str {
        "gnome-extensions"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn gate(&self) -> Option<&str> {
        Some(EXTENSIONS_GATE)
    }

    fn summary(&self) -> String {
        self.uuids.join(", ")
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        let enabled = desktop::enabled_extensions(ctx.system);
        self.uuids.iter().all(|uuid| {
            desktop::is_extension_present(ctx.home(), uuid) && enabled.contains(uuid)
        })
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let major = desktop::shell_major_version(ctx.system)?;
        debug!("GNOME Shell major version {major}");
        let registry = Registry::new(self.registry.as_str());

        let mut failures = Vec::new();
        for uuid in &self.uuids {
            let result = if desktop::is_extension_present(ctx.home(), uuid) {
                Ok(())
            } else {
                self.install(ctx, &registry, major, uuid)
            };

            let result = result.and_then(|()| {
                if desktop::is_extension_enabled(ctx.system, uuid) {
                    Ok(())
                } else {
                    desktop::enable_extension(ctx.system, uuid).map_err(StepError::from)
                }
            });

            if let Err(error) = result {
                failures.push(format!("{uuid}: {}", error_chain(&error)));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(StepError::Batch {
                count: failures.len(),
                details: failures.join("\n"),
            })
        }
    }

    fn manual_hint(&self) -> Option<String> {
        Some(format!(
            "install from {}/ then run: {}",
            self.registry.trim_end_matches('/'),
            self.uuids
                .iter()
                .map(|uuid| format!("gnome-extensions enable {uuid}"))
                .collect::<Vec<_>>()
                .join(" && ")
        ))
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GNOME desktop plumbing.
//!
//! Settings are read and written through `gsettings`. Extensions are fetched
//! from the GNOME extension registry, unpacked into the user's extension
//! directory, and enabled through `gnome-extensions`, falling back to editing
//! the `enabled-extensions` list in dconf directly when the shell does not
//! know about a freshly unpacked extension yet.

pub mod registry;
pub mod variant;

use crate::{
    config::SettingEntry,
    desktop::{registry::RegistryError, variant::StringArray},
    system::{Invocation, System, SystemError},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Dconf key listing enabled extensions.
pub const ENABLED_EXTENSIONS_KEY: &str = "/org/gnome/shell/enabled-extensions";

/// Current value of gsettings key, `None` if it cannot be read.
pub fn gsettings_get(system: &dyn System, schema: &str, key: &str) -> Option<String> {
    let invocation = Invocation::new("gsettings").args(["get", schema, key]);
    match system.run(&invocation) {
        Ok(output) if output.success => Some(output.stdout.trim().to_string()),
        Ok(output) => {
            debug!("{invocation}: {}", output.message());
            None
        }
        Err(error) => {
            debug!("{invocation}: {error}");
            None
        }
    }
}

/// Check whether gsettings key already holds desired value.
///
/// Type annotations printed by gsettings, like `uint32 5`, are ignored.
pub fn is_setting_applied(system: &dyn System, entry: &SettingEntry) -> bool {
    gsettings_get(system, &entry.schema, &entry.key)
        .is_some_and(|current| strip_type_annotation(&current) == strip_type_annotation(&entry.value))
}

fn strip_type_annotation(value: &str) -> &str {
    const ANNOTATIONS: [&str; 8] = [
        "byte ", "int16 ", "uint16 ", "int32 ", "uint32 ", "int64 ", "uint64 ", "@as ",
    ];
    let value = value.trim();
    ANNOTATIONS
        .iter()
        .find_map(|annotation| value.strip_prefix(annotation))
        .unwrap_or(value)
}

pub(crate) fn gsettings_set(entry: &SettingEntry) -> Invocation {
    Invocation::new("gsettings").args([
        "set",
        entry.schema.as_str(),
        entry.key.as_str(),
        entry.value.as_str(),
    ])
}

/// Write gsettings key.
///
/// # Errors
///
/// - Return [`SystemError`] if `gsettings set` fails.
pub fn apply_setting(system: &dyn System, entry: &SettingEntry) -> Result<(), SystemError> {
    info!("set {} {} to {}", entry.schema, entry.key, entry.value);
    system.run_checked(&gsettings_set(entry))?;
    Ok(())
}

/// Major version of running GNOME Shell.
///
/// # Errors
///
/// - Return [`DesktopError::System`] if `gnome-shell --version` fails.
/// - Return [`DesktopError::Registry`] if output holds no version.
pub fn shell_major_version(system: &dyn System) -> Result<u32> {
    let output = system.run_checked(&Invocation::new("gnome-shell").arg("--version"))?;
    registry::parse_shell_version(&output)
        .ok_or_else(|| RegistryError::ShellVersion(output.trim().to_string()).into())
}

/// Directory extension with given uuid is installed to.
pub fn extension_dir(home: &Path, uuid: &str) -> PathBuf {
    home.join(".local/share/gnome-shell/extensions").join(uuid)
}

/// Check whether extension is unpacked into the user extension directory.
pub fn is_extension_present(home: &Path, uuid: &str) -> bool {
    extension_dir(home, uuid).join("metadata.json").is_file()
}

/// Enabled extension listing from dconf.
///
/// An unreadable or malformed list counts as empty.
pub fn enabled_extensions(system: &dyn System) -> StringArray {
    let invocation = Invocation::new("dconf").args(["read", ENABLED_EXTENSIONS_KEY]);
    match system.run(&invocation) {
        Ok(output) if output.success => output.stdout.parse().unwrap_or_else(|error| {
            warn!("ignore malformed enabled-extensions list: {error}");
            StringArray::default()
        }),
        _ => StringArray::default(),
    }
}

/// Check whether extension is listed as enabled.
pub fn is_extension_enabled(system: &dyn System, uuid: &str) -> bool {
    enabled_extensions(system).contains(uuid)
}

/// Enable extension.
///
/// Tries `gnome-extensions enable` first. When the shell has not picked up
/// the extension yet, the uuid is appended to the enabled list in dconf so it
/// is enabled on next login.
///
/// # Errors
///
/// - Return [`DesktopError::System`] if dconf cannot be written.
pub fn enable_extension(system: &dyn System, uuid: &str) -> Result<()> {
    let enable = Invocation::new("gnome-extensions").args(["enable", uuid]);
    if system.probe(&enable) {
        info!("enabled extension {uuid}");
        return Ok(());
    }

    warn!("gnome-extensions cannot enable {uuid}, fall back to dconf");
    let mut enabled = enabled_extensions(system);
    if enabled.insert(uuid) {
        system.run_checked(&Invocation::new("dconf").args([
            "write".to_string(),
            ENABLED_EXTENSIONS_KEY.to_string(),
            enabled.to_string(),
        ]))?;
        info!("added {uuid} to enabled extensions, takes effect on next login");
    }

    Ok(())
}

/// Desktop error types.
#[derive(Debug, thiserror::Error)]
pub enum DesktopError {
    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Friendly result alias :3
pub type Result<T, E = DesktopError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("uint32 5", "5", true; "integer annotation")]
    #[test_case("'Adwaita-dark'", "'Adwaita-dark'", true; "plain string")]
    #[test_case("'Adwaita'", "'Adwaita-dark'", false; "different string")]
    #[test_case("@as []", "[]", true; "empty array")]
    #[test]
    fn annotation_insensitive_comparison(current: &str, desired: &str, expect: bool) {
        assert_eq!(
            strip_type_annotation(current) == strip_type_annotation(desired),
            expect
        );
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Setup definition layout.
//!
//! Specify the layout of the setup definition, the TOML document that
//! describes what a run should install and configure. A default definition is
//! compiled into the binary, but a local file or a remote copy can be used
//! instead.
//!
//! # General Layout
//!
//! The definition is made of runtime knobs (`[settings]`, `[network]`,
//! `[privilege]`, `[gates]`) followed by one section per kind of step. Any
//! step section left out of the definition simply produces no step. Every
//! runtime knob has a default.
//!
//! # Path Expansion
//!
//! Path-valued fields go through shell expansion on parse, so `~` and
//! environment variables can be used freely. Relative paths left after
//! expansion are resolved against the user's home directory at run time.

use crate::{
    download::{RetryPolicy, Timeouts},
    packages::PartialPolicy,
    path::{default_cache_dir, NoWayHome},
};

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Environment variable selecting an alternate remote definition source.
pub const SOURCE_ENV: &str = "ZORIN_SETUP_SOURCE";

/// Canonical remote location of the setup definition.
pub const DEFAULT_SOURCE: &str = "https://raw.githubusercontent.com/awkless/zorin-setup/main";

const BUILTIN: &str = include_str!("../setup.toml");

/// Setup definition layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SetupDefinition {
    pub settings: Settings,
    pub network: NetworkSettings,
    pub privilege: PrivilegeSettings,

    /// Gate name to yes/no question.
    pub gates: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub packages: Option<PackageSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<ShellSection>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub installers: Vec<InstallerEntry>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginEntry>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<RepositoryEntry>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snaps: Vec<SnapEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fonts: Option<FontSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub dotfiles: Option<DotfileSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<ProjectSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop: Option<DesktopSection>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<ToolEntry>,
}

impl SetupDefinition {
    /// Definition compiled into the binary.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Deserialize`] if builtin definition is broken.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    /// - Return [`ConfigError::ZeroDuration`] if a timeout or keep-alive is zero.
    pub fn builtin() -> Result<Self> {
        BUILTIN.parse()
    }

    /// Load definition from local file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not a valid definition.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    /// - Return [`ConfigError::ZeroDuration`] if a timeout or keep-alive is zero.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        data.parse()
    }

    /// Parse definition fetched from a remote source.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Encoding`] if data is not UTF-8.
    /// - Return [`ConfigError::Deserialize`] if data is not a valid definition.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    /// - Return [`ConfigError::ZeroDuration`] if a timeout or keep-alive is zero.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        String::from_utf8(data)?.parse()
    }

    /// Absolute path to download cache directory.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NoWayHome`] if no cache directory was configured
    ///   and the default cannot be determined.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.settings.cache_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(default_cache_dir()?),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.network.max_retries,
            Duration::from_secs(self.network.retry_delay_secs),
        )
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.network.connect_timeout_secs),
            overall: Duration::from_secs(self.network.timeout_secs),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.network.probe_timeout_secs)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.privilege.keepalive_secs)
    }

    /// Reject timeout and keep-alive knobs set to zero.
    fn reject_zero_durations(&self) -> Result<()> {
        let knobs = [
            ("network.connect_timeout_secs", self.network.connect_timeout_secs),
            ("network.timeout_secs", self.network.timeout_secs),
            ("network.probe_timeout_secs", self.network.probe_timeout_secs),
            ("privilege.keepalive_secs", self.privilege.keepalive_secs),
        ];
        match knobs.into_iter().find(|(_, secs)| *secs == 0) {
            Some((knob, _)) => Err(ConfigError::ZeroDuration(knob)),
            None => Ok(()),
        }
    }

    fn expand_paths(&mut self) -> Result<()> {
        if let Some(path) = self.settings.cache_dir.as_mut() {
            expand_path(path)?;
        }

        if let Some(shell) = self.shell.as_mut() {
            expand_path(&mut shell.path)?;
        }

        for installer in &mut self.installers {
            if let Some(path) = installer.creates.as_mut() {
                expand_path(path)?;
            }
        }

        for plugin in &mut self.plugins {
            expand_path(&mut plugin.dest)?;
        }

        for repository in &mut self.repositories {
            expand_path(&mut repository.keyring)?;
            expand_path(&mut repository.list_file)?;
        }

        if let Some(fonts) = self.fonts.as_mut() {
            expand_path(&mut fonts.dest)?;
        }

        if let Some(dotfiles) = self.dotfiles.as_mut() {
            expand_path(&mut dotfiles.root)?;
            for link in &mut dotfiles.links {
                link.source = expand(&link.source)?;
                expand_path(&mut link.target)?;
            }
        }

        if let Some(projects) = self.projects.as_mut() {
            for directory in &mut projects.directories {
                expand_path(directory)?;
            }
        }

        Ok(())
    }
}

impl FromStr for SetupDefinition {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut definition: SetupDefinition =
            toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path-valued field.
        definition.expand_paths()?;
        definition.reject_zero_durations()?;

        Ok(definition)
    }
}

impl Display for SetupDefinition {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(data: &str) -> Result<String> {
    Ok(shellexpand::full(data)
        .map_err(ConfigError::ShellExpansion)?
        .into_owned())
}

fn expand_path(path: &mut PathBuf) -> Result<()> {
    *path = PathBuf::from(expand(path.to_string_lossy().as_ref())?);
    Ok(())
}

/// Location of a definition fetched with `--remote`.
///
/// Uses [`SOURCE_ENV`] when set, [`DEFAULT_SOURCE`] otherwise.
pub fn remote_definition_url(source: Option<&str>) -> String {
    let source = source
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .unwrap_or(DEFAULT_SOURCE);
    format!("{}/setup.toml", source.trim_end_matches('/'))
}

/// General settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Download cache directory, `$XDG_CACHE_HOME/zorin-setup` if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

/// Network knobs.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
    pub probe_urls: Vec<String>,
    pub probe_timeout_secs: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 5,
            connect_timeout_secs: 10,
            timeout_secs: 300,
            probe_urls: vec![
                "https://archive.ubuntu.com".into(),
                "https://github.com".into(),
            ],
            probe_timeout_secs: 5,
        }
    }
}

/// Privilege keep-alive knobs.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrivilegeSettings {
    /// Seconds between sudo timestamp renewals.
    pub keepalive_secs: u64,
}

impl Default for PrivilegeSettings {
    fn default() -> Self {
        Self { keepalive_secs: 60 }
    }
}

/// Base apt packages.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PackageSection {
    pub names: Vec<String>,

    #[serde(default)]
    pub policy: PartialPolicy,
}

/// Login shell.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ShellSection {
    /// Apt package providing the shell.
    pub package: String,

    /// Absolute path to shell binary.
    pub path: PathBuf,
}

/// Third-party installer script.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct InstallerEntry {
    pub name: String,
    pub url: String,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Path that exists once installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates: Option<PathBuf>,

    /// Command that is on `PATH` once installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provides: Option<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub privileged: bool,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_interpreter() -> String {
    "sh".into()
}

/// Shell plugin cloned from git.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PluginEntry {
    pub name: String,
    pub url: String,
    pub dest: PathBuf,
}

/// Third-party apt repository.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepositoryEntry {
    pub name: String,
    pub key_url: String,

    /// Convert ASCII armored key to binary keyring with `gpg --dearmor`.
    #[serde(default)]
    pub dearmor: bool,

    pub keyring: PathBuf,

    /// Line written to the source list file.
    pub source: String,

    pub list_file: PathBuf,
    pub packages: Vec<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<String>,
}

/// Snap package.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SnapEntry {
    pub name: String,

    #[serde(default)]
    pub classic: bool,
}

/// Font archive.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct FontSection {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    /// Free space needed at destination, in megabytes.
    #[serde(default)]
    pub required_space_mb: u64,

    pub dest: PathBuf,

    /// Glob matched inside destination that marks fonts as installed.
    pub marker: String,
}

/// Dotfile links.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DotfileSection {
    /// Directory holding the dotfiles, relative sources resolve against it.
    pub root: PathBuf,

    /// Git repository cloned into root when root does not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkEntry>,
}

/// Single dotfile link.
///
/// A source containing glob characters links every match into target, which
/// is then treated as a directory.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct LinkEntry {
    pub source: String,
    pub target: PathBuf,
}

/// Project directories.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ProjectSection {
    pub directories: Vec<PathBuf>,
}

/// GNOME desktop configuration.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DesktopSection {
    #[serde(default = "default_registry")]
    pub registry: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<SettingEntry>,
}

impl Default for DesktopSection {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            extensions: Vec::new(),
            settings: Vec::new(),
        }
    }
}

fn default_registry() -> String {
    "https://extensions.gnome.org".into()
}

/// Single gsettings key.
///
/// Value is written in GVariant text format, e.g. `'Adwaita-dark'` or `true`.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct SettingEntry {
    pub schema: String,
    pub key: String,
    pub value: String,
}

/// Tool listed in the version summary.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolEntry {
    pub name: String,
    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Failed to read definition file.
    #[error("failed to read setup definition {:?}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Remote definition is not valid UTF-8.
    #[error("remote setup definition is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    NoWayHome(#[from] NoWayHome),

    /// Duration knob set to zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("DOTS", "/home/blah/dotfiles")])]
    fn deserialize_setup_definition() -> anyhow::Result<()> {
        let result: SetupDefinition = indoc! {r#"
            [network]
            max_retries = 5

            [gates]
            desktop = "Apply desktop theming?"

            [packages]
            names = ["git", "curl"]
            policy = "abort"

            [[installers]]
            name = "rustup"
            url = "https://sh.rustup.rs"
            args = ["-s", "--", "-y"]
            provides = "rustup"

            [dotfiles]
            root = "$DOTS"

            [[dotfiles.links]]
            source = "zsh/zshrc"
            target = ".zshrc"
        "#}
        .parse()?;

        let expect = SetupDefinition {
            network: NetworkSettings {
                max_retries: 5,
                ..Default::default()
            },
            gates: BTreeMap::from([("desktop".into(), "Apply desktop theming?".into())]),
            packages: Some(PackageSection {
                names: vec!["git".into(), "curl".into()],
                policy: PartialPolicy::Abort,
            }),
            installers: vec![InstallerEntry {
                name: "rustup".into(),
                url: "https://sh.rustup.rs".into(),
                interpreter: "sh".into(),
                args: vec!["-s".into(), "--".into(), "-y".into()],
                provides: Some("rustup".into()),
                ..Default::default()
            }],
            dotfiles: Some(DotfileSection {
                root: "/home/blah/dotfiles".into(),
                repository: None,
                links: vec![LinkEntry {
                    source: "zsh/zshrc".into(),
                    target: ".zshrc".into(),
                }],
            }),
            ..Default::default()
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn display_round_trips() -> anyhow::Result<()> {
        let definition = SetupDefinition::builtin()?;
        let reparsed: SetupDefinition = definition.to_string().parse()?;
        assert_eq!(reparsed, definition);

        Ok(())
    }

    #[test]
    fn missing_sections_produce_defaults() -> anyhow::Result<()> {
        let definition: SetupDefinition = "".parse()?;
        assert_eq!(definition.network.max_retries, 3);
        assert_eq!(definition.privilege.keepalive_secs, 60);
        assert_eq!(definition.keepalive(), Duration::from_secs(60));
        assert!(definition.packages.is_none());

        Ok(())
    }

    #[test]
    fn remote_definition_url_prefers_source() {
        assert_eq!(
            remote_definition_url(Some("https://example.org/setup/")),
            "https://example.org/setup/setup.toml"
        );
        assert_eq!(
            remote_definition_url(None),
            format!("{DEFAULT_SOURCE}/setup.toml")
        );
        assert_eq!(
            remote_definition_url(Some("  ")),
            format!("{DEFAULT_SOURCE}/setup.toml")
        );
    }

    #[test]
    fn zero_durations_are_rejected() {
        let cases = [
            ("[network]\nconnect_timeout_secs = 0", "network.connect_timeout_secs"),
            ("[network]\ntimeout_secs = 0", "network.timeout_secs"),
            ("[network]\nprobe_timeout_secs = 0", "network.probe_timeout_secs"),
            ("[privilege]\nkeepalive_secs = 0", "privilege.keepalive_secs"),
        ];
        for (data, knob) in cases {
            let result = data.parse::<SetupDefinition>();
            assert!(
                matches!(result, Err(ConfigError::ZeroDuration(rejected)) if rejected == knob),
                "{knob} accepted zero"
            );
        }

        let result = "[network]\nretry_delay_secs = 0".parse::<SetupDefinition>();
        assert!(result.is_ok(), "zero retry delay is allowed");
    }

    #[test]
    fn remote_bytes_must_be_utf8() {
        let result = SetupDefinition::from_bytes(vec![0xff, 0xfe]);
        assert!(matches!(result, Err(ConfigError::Encoding(_))));
    }
}

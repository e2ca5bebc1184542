// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! GNOME extension registry client.

use crate::download::{DownloadError, Downloader};

use serde::Deserialize;
use tracing::debug;

/// Extension metadata returned by `/extension-info/`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtensionInfo {
    pub uuid: String,
    pub name: String,
    pub pk: u64,

    /// Release compatible with the requested shell version.
    #[serde(default)]
    pub version: Option<u64>,

    #[serde(default)]
    pub version_tag: Option<u64>,

    /// Download path relative to registry root.
    pub download_url: String,
}

/// Client for the extension registry.
#[derive(Debug, Clone)]
pub struct Registry {
    base: String,
}

impl Registry {
    /// Construct registry client for base URL, e.g. `https://extensions.gnome.org`.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the metadata query for extension at shell major version.
    pub fn info_url(&self, uuid: &str, shell_major: u32) -> String {
        format!(
            "{}/extension-info/?uuid={uuid}&shell_version={shell_major}",
            self.base
        )
    }

    /// Absolute download URL of extension release.
    pub fn download_url(&self, info: &ExtensionInfo) -> String {
        if info.download_url.starts_with("http://") || info.download_url.starts_with("https://") {
            info.download_url.clone()
        } else {
            format!("{}/{}", self.base, info.download_url.trim_start_matches('/'))
        }
    }

    /// Query registry for extension compatible with shell major version.
    ///
    /// # Errors
    ///
    /// - Return [`RegistryError::Download`] if registry cannot be reached.
    /// - Return [`RegistryError::Decode`] if response is not extension info.
    pub fn lookup(&self, downloader: &Downloader, uuid: &str, shell_major: u32) -> Result<ExtensionInfo> {
        let url = self.info_url(uuid, shell_major);
        debug!("query extension registry: {url}");
        let body = downloader.fetch_bytes(&url)?;
        let info: ExtensionInfo = serde_json::from_slice(&body).map_err(|source| RegistryError::Decode {
            uuid: uuid.into(),
            source,
        })?;

        if info.uuid != uuid {
            return Err(RegistryError::UuidMismatch {
                requested: uuid.into(),
                received: info.uuid,
            });
        }

        Ok(info)
    }
}

/// Major version from `gnome-shell --version` output, e.g. `GNOME Shell 43.9`.
pub fn parse_shell_version(output: &str) -> Option<u32> {
    output
        .split_whitespace()
        .find(|word| word.starts_with(|c: char| c.is_ascii_digit()))
        .and_then(|version| version.split('.').next())
        .and_then(|major| major.parse().ok())
}

/// Extension registry error types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Registry response is not valid extension info.
    #[error("invalid registry response for extension {uuid}")]
    Decode {
        uuid: String,
        #[source]
        source: serde_json::Error,
    },

    /// Registry answered for a different extension.
    #[error("registry returned extension {received} when asked for {requested}")]
    UuidMismatch { requested: String, received: String },

    /// GNOME Shell version cannot be determined.
    #[error("cannot determine GNOME Shell version from {0:?}")]
    ShellVersion(String),
}

/// Friendly result alias :3
pub type Result<T, E = RegistryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use simple_test_case::test_case;

    #[test_case("GNOME Shell 43.9\n", Some(43); "minor release")]
    #[test_case("GNOME Shell 46.0", Some(46); "point zero")]
    #[test_case("GNOME Shell 3.38.4", Some(3); "legacy numbering")]
    #[test_case("gnome-shell: command not found", None; "no version")]
    #[test]
    fn shell_major_version(output: &str, expect: Option<u32>) {
        pretty_assertions::assert_eq!(parse_shell_version(output), expect);
    }

    #[test]
    fn decode_extension_info() -> anyhow::Result<()> {
        let body = indoc! {r#"
            {
                "uuid": "dash-to-dock@micxgx.gmail.com",
                "name": "Dash to Dock",
                "creator": "michele_g",
                "pk": 307,
                "description": "A dock for the GNOME Shell.",
                "link": "/extension/307/dash-to-dock/",
                "version": 89,
                "version_tag": 41267,
                "download_url": "/download-extension/dash-to-dock@micxgx.gmail.com.shell-extension.zip?version_tag=41267"
            }
        "#};
        let info: ExtensionInfo = serde_json::from_str(body)?;
        pretty_assertions::assert_eq!(info.pk, 307);
        pretty_assertions::assert_eq!(info.version, Some(89));

        let registry = Registry::new("https://extensions.gnome.org/");
        pretty_assertions::assert_eq!(
            registry.download_url(&info),
            "https://extensions.gnome.org/download-extension/dash-to-dock@micxgx.gmail.com.shell-extension.zip?version_tag=41267"
        );
        pretty_assertions::assert_eq!(
            registry.info_url("dash-to-dock@micxgx.gmail.com", 43),
            "https://extensions.gnome.org/extension-info/?uuid=dash-to-dock@micxgx.gmail.com&shell_version=43"
        );

        Ok(())
    }
}

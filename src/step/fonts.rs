// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    archive, checksum,
    config::FontSection,
    context::Context,
    disk,
    step::{Criticality, Result, Step},
    system::Invocation,
};

use tracing::{debug, warn};

const MEGABYTE: u64 = 1024 * 1024;

/// Font archive unpacked into a font directory.
#[derive(Debug, Clone)]
pub struct FontArchive {
    section: FontSection,
}

impl FontArchive {
    pub fn new(section: FontSection) -> Self {
        Self { section }
    }

    fn archive_name(&self) -> String {
        self.section
            .url
            .rsplit('/')
            .next()
            .and_then(|name| name.split(['?', '#']).next())
            .filter(|name| !name.is_empty())
            .unwrap_or("fonts.zip")
            .to_string()
    }
}

impl Step for FontArchive {
    fn name(&self) -> &str {
        "fonts"
    }

    fn kind(&self) -> &'static str {
        "font-archive"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn summary(&self) -> String {
        format!("{} into {}", self.archive_name(), self.section.dest.display())
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        let dest = ctx.resolve(&self.section.dest);
        let pattern = dest.join(&self.section.marker);
        match glob::glob(&pattern.to_string_lossy()) {
            Ok(mut paths) => paths.any(|path| path.is_ok()),
            Err(error) => {
                debug!("bad font marker {pattern:?}: {error}");
                false
            }
        }
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let dest = ctx.resolve(&self.section.dest);
        disk::ensure_space(
            ctx.system,
            &dest,
            self.section.required_space_mb.saturating_mul(MEGABYTE),
        )?;

        let archive = ctx.staging_file(&self.archive_name());
        ctx.downloader.download(&self.section.url, &archive)?;
        if let Err(error) = checksum::verify(&archive, self.section.sha256.as_deref()) {
            // INVARIANT: Never serve a corrupt archive from cache twice.
            ctx.downloader.cache().evict(&self.archive_name())?;
            return Err(error.into());
        }
        archive::extract_zip(&archive, &dest)?;

        if !ctx.system.probe(&Invocation::new("fc-cache").arg("-f")) {
            warn!("failed to rebuild font cache, fonts show up after next login");
        }

        Ok(())
    }

    fn manual_hint(&self) -> Option<String> {
        Some(format!(
            "curl -fLo /tmp/{name} {} && unzip -o /tmp/{name} -d {} && fc-cache -f",
            self.section.url,
            self.section.dest.display(),
            name = self.archive_name(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn archive_name_drops_query() {
        let step = FontArchive::new(FontSection {
            url: "https://github.com/ryanoasis/nerd-fonts/releases/latest/download/Hack.zip?raw=1".into(),
            ..Default::default()
        });
        assert_eq!(step.archive_name(), "Hack.zip");
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::DotfileSection,
    context::Context,
    link::{self, LinkError, LinkOutcome},
    step::{error_chain, plugins::clone_with_progress, Criticality, Result, Step, StepError},
};

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Dotfiles linked into the user's home.
#[derive(Debug, Clone)]
pub struct Dotfiles {
    section: DotfileSection,
}

impl Dotfiles {
    pub fn new(section: DotfileSection) -> Self {
        Self { section }
    }

    /// Every `(source, dest)` pair to link, with glob sources expanded.
    fn planned_links(&self, ctx: &Context<'_>) -> Result<Vec<(PathBuf, PathBuf)>> {
        let root = ctx.resolve(&self.section.root);
        let mut links = Vec::new();
        for entry in &self.section.links {
            let source = root.join(&entry.source);
            let target = ctx.resolve(&entry.target);
            if !is_glob(&entry.source) {
                links.push((source, target));
                continue;
            }

            // INVARIANT: Glob sources link every match into target directory.
            for matched in glob::glob(&source.to_string_lossy())? {
                let matched = matched.map_err(|error| {
                    let path = error.path().to_path_buf();
                    StepError::io(path, error.into_error())
                })?;
                if let Some(name) = matched.file_name() {
                    let dest = target.join(name);
                    links.push((matched, dest));
                }
            }
        }

        Ok(links)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

impl Step for Dotfiles {
    fn name(&self) -> &str {
        "dotfiles"
    }

    fn kind(&self) -> &'static str {
        "dotfiles"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Required
    }

    fn summary(&self) -> String {
        format!(
            "{} link(s) from {}",
            self.section.links.len(),
            self.section.root.display()
        )
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        if !ctx.resolve(&self.section.root).is_dir() {
            return false;
        }

        match self.planned_links(ctx) {
            Ok(links) => links
                .iter()
                .all(|(source, dest)| link::is_linked(source, dest)),
            Err(error) => {
                debug!("cannot plan dotfile links: {error}");
                false
            }
        }
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let root = ctx.resolve(&self.section.root);
        if !root.is_dir() {
            match &self.section.repository {
                Some(url) => {
                    info!("clone dotfiles from {url}");
                    clone_with_progress(url, &root)?;
                }
                None => return Err(LinkError::MissingSource(root).into()),
            }
        }

        let mut failures = Vec::new();
        for (source, dest) in self.planned_links(ctx)? {
            match link::link_with_backup(&source, &dest) {
                Ok(LinkOutcome::BackedUp(backup)) => ctx.reporter.note(format!(
                    "moved existing {} to {}",
                    dest.display(),
                    backup.display()
                )),
                Ok(_) => {}
                Err(error) => failures.push(format!("{}: {}", dest.display(), error_chain(&error))),
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
        let root = self.section.root.as_path();
        let commands = self
            .section
            .links
            .iter()
            .map(|entry| {
                let source = root.join(&entry.source);
                if is_glob(&entry.source) {
                    format!("ln -s {} {}/", source.display(), under_tilde(&entry.target))
                } else {
                    format!("ln -s {} {}", source.display(), under_tilde(&entry.target))
                }
            })
            .collect::<Vec<_>>();
        Some(commands.join(" && "))
    }
}

fn under_tilde(path: &Path) -> String {
    if path.is_absolute() {
        path.display().to_string()
    } else {
        format!("~/{}", path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("zsh/zshrc", false; "plain path")]
    #[test_case("bin/*", true; "star")]
    #[test_case("nvim/?.lua", true; "question mark")]
    #[test_case("fonts/[a-z]*.ttf", true; "character class")]
    #[test]
    fn glob_detection(pattern: &str, expect: bool) {
        assert_eq!(is_glob(pattern), expect);
    }
}

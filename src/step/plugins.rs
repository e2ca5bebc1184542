// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use crate::{
    config::PluginEntry,
    context::Context,
    step::{error_chain, Criticality, Result, Step, StepError},
};

use git2::{build::RepoBuilder, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::{path::Path, time};
use tracing::{debug, info, instrument};

/// Shell plugins cloned from git remotes.
#[derive(Debug, Clone)]
pub struct GitPlugins {
    plugins: Vec<PluginEntry>,
}

impl GitPlugins {
    pub fn new(plugins: Vec<PluginEntry>) -> Self {
        Self { plugins }
    }
}

/// Check whether path holds a git repository.
pub fn is_repository(path: &Path) -> bool {
    Repository::open(path).is_ok()
}

/// Clone remote repository into target path.
///
/// The progress of the clone is displayed through a progress bar that clears
/// itself once done.
///
/// # Errors
///
/// - Return [`StepError::Git2`] if libgit2 operations fail.
/// - Return [`StepError::IndicatifStyleTemplate`] if progress bar cannot be
///   styled.
#[instrument(skip(path), level = "debug")]
pub fn clone_with_progress(url: &str, path: &Path) -> Result<Repository> {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    bar.set_style(style);
    bar.set_message(url.to_string());
    bar.enable_steady_tick(time::Duration::from_millis(100));

    let mut throttle = time::Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        let bar_size = stats.total_objects() as u64;
        let bar_pos = stats.received_objects() as u64;
        if throttle.elapsed() > time::Duration::from_millis(10) {
            throttle = time::Instant::now();
            bar.set_length(bar_size);
            bar.set_position(bar_pos);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    let result = RepoBuilder::new().fetch_options(fo).clone(url, path);
    bar.finish_and_clear();

    Ok(result?)
}

impl Step for GitPlugins {
    fn name(&self) -> &str {
        "shell-plugins"
    }

    fn kind(&self) -> &'static str {
        "git-plugins"
    }

    fn criticality(&self) -> Criticality {
        Criticality::Optional
    }

    fn summary(&self) -> String {
        self.plugins
            .iter()
            .map(|plugin| plugin.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn is_satisfied(&self, ctx: &Context<'_>) -> bool {
        self.plugins
            .iter()
            .all(|plugin| is_repository(&ctx.resolve(&plugin.dest)))
    }

    fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let mut failures = Vec::new();
        for plugin in &self.plugins {
            let dest = ctx.resolve(&plugin.dest);
            if is_repository(&dest) {
                debug!("plugin {} already cloned", plugin.name);
                continue;
            }

            info!("clone plugin {} into {:?}", plugin.name, dest.display());
            if let Err(error) = clone_with_progress(&plugin.url, &dest) {
                failures.push(format!("{}: {}", plugin.name, error_chain(&error)));
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
        let commands = self
            .plugins
            .iter()
            .map(|plugin| format!("git clone {} {}", plugin.url, plugin.dest.display()))
            .collect::<Vec<_>>();
        Some(commands.join(" && "))
    }
}

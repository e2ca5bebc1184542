// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use zorin_setup::{
    cache::DownloadCache,
    catalog::Catalog,
    config::{remote_definition_url, SetupDefinition, SOURCE_ENV},
    context::Context,
    download::{Downloader, HttpTransport},
    orchestrator::{AssumeYes, InquirePrompter, Orchestrator, Prompter},
    path::home_dir,
    privilege::Sudo,
    report::Reporter,
    summary,
    system::HostSystem,
};

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use nix::unistd::{getuid, User};
use std::{env, path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  zorin-setup [options] [run]\n  zorin-setup [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub options: SourceOptions,
}

impl Cli {
    fn run(self) -> Result<()> {
        match self.command.unwrap_or(Command::Run) {
            Command::Run => run_setup(self.options),
            Command::List => run_list(self.options),
            Command::Summary => run_summary(self.options),
            Command::Cache(CacheCommand::Clear) => run_cache_clear(self.options),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run every setup step in order (default).
    #[command(override_usage = "zorin-setup run [options]")]
    Run,

    /// List setup steps without running them.
    #[command(override_usage = "zorin-setup list [options]")]
    List,

    /// Show versions of installed tools.
    #[command(override_usage = "zorin-setup summary [options]")]
    Summary,

    /// Manage download cache.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Clone, Subcommand)]
enum CacheCommand {
    /// Remove every cached download.
    #[command(override_usage = "zorin-setup cache clear [options]")]
    Clear,
}

#[derive(Args, Clone, Debug)]
struct SourceOptions {
    /// Path to setup definition to use instead of the builtin one.
    #[arg(short, long, global = true, value_name = "path", conflicts_with = "remote")]
    pub definition: Option<PathBuf>,

    /// Fetch setup definition from remote source.
    #[arg(short, long, global = true)]
    pub remote: bool,

    /// Answer yes to every question.
    #[arg(short = 'y', long, global = true)]
    pub assume_yes: bool,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}

fn run_setup(opts: SourceOptions) -> Result<()> {
    let definition = load_definition(&opts)?;
    let catalog = Catalog::build(&definition)?;

    let system = HostSystem::new();
    let downloader = downloader_for(&definition)?;
    let mut ctx = Context::new(
        &system,
        &downloader,
        current_user()?,
        home_dir()?,
        Reporter::default(),
    );

    let elevation = Sudo::new(definition.keepalive());
    let prompter: Box<dyn Prompter> = if opts.assume_yes {
        Box::new(AssumeYes)
    } else {
        Box::new(InquirePrompter)
    };

    let mut orchestrator = Orchestrator::new(&catalog, &definition, &elevation, prompter.as_ref());
    let summary = orchestrator.run(&mut ctx)?;
    info!("setup finished: {summary}");

    Ok(())
}

fn run_list(opts: SourceOptions) -> Result<()> {
    let definition = load_definition(&opts)?;
    let catalog = Catalog::build(&definition)?;
    for descriptor in catalog.descriptors() {
        println!("{descriptor}");
    }

    Ok(())
}

fn run_summary(opts: SourceOptions) -> Result<()> {
    let definition = load_definition(&opts)?;
    let versions = summary::tool_versions(&HostSystem::new(), &definition.summary);
    summary::print(&Reporter::default(), &versions);

    Ok(())
}

fn run_cache_clear(opts: SourceOptions) -> Result<()> {
    let definition = load_definition(&opts)?;
    let cache = DownloadCache::new(definition.cache_dir()?);
    cache.clear()?;
    info!("cleared download cache {:?}", cache.root().display());

    Ok(())
}

fn load_definition(opts: &SourceOptions) -> Result<SetupDefinition> {
    if opts.remote {
        let source = env::var(SOURCE_ENV).ok();
        let url = remote_definition_url(source.as_deref());
        info!("fetch setup definition from {url}");

        // INVARIANT: Remote definition is fetched with default network knobs.
        let downloader = downloader_for(&SetupDefinition::default())?;
        let data = downloader.fetch_bytes(&url)?;
        return Ok(SetupDefinition::from_bytes(data)?);
    }

    match &opts.definition {
        Some(path) => Ok(SetupDefinition::load(path)?),
        None => Ok(SetupDefinition::builtin()?),
    }
}

fn downloader_for(definition: &SetupDefinition) -> Result<Downloader> {
    let transport = HttpTransport::new(definition.timeouts())?;
    let cache = DownloadCache::new(definition.cache_dir()?);

    Ok(Downloader::new(
        Box::new(transport),
        cache,
        definition.retry_policy(),
    ))
}

fn current_user() -> Result<String> {
    let user = User::from_uid(getuid())?
        .ok_or_else(|| anyhow!("current user has no passwd entry"))?;

    Ok(user.name)
}

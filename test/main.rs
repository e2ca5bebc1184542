// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

mod catalog;

use zorin_setup::{
    cache::DownloadCache,
    catalog::Catalog,
    config::SetupDefinition,
    context::Context,
    download::{Downloader, RetryPolicy, Transport, TransportError},
    orchestrator::{Orchestrator, Prompter, RunError, RunState, RunSummary},
    privilege::{Elevation, Lease, PrivilegeError, Result as PrivilegeResult},
    report::Reporter,
    system::{Invocation, Output, Result as SystemResult, System, SystemError},
};

use anyhow::Result;
use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};
use inquire::InquireError;
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet, HashMap},
    env,
    io::{Cursor, Write},
    path::{Path, PathBuf},
    rc::Rc,
    time::Duration,
};
use termcolor::ColorChoice;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

pub(crate) const USER: &str = "zorin";

/// Programs whose invocation never changes the machine.
const READ_ONLY: [&[&str]; 7] = [
    &["dpkg-query"],
    &["getent"],
    &["snap", "list"],
    &["gsettings", "get"],
    &["dconf", "read"],
    &["gnome-shell", "--version"],
    &["apt-get", "update"],
];

/// Simulated Zorin OS machine.
///
/// Keeps just enough state for detection to observe what earlier commands
/// did, so a second run can tell that everything is already in place.
#[derive(Debug)]
pub(crate) struct FakeSystem {
    log: RefCell<Vec<Vec<String>>>,
    packages: RefCell<BTreeSet<String>>,
    broken: BTreeSet<String>,
    snaps: RefCell<BTreeSet<String>>,
    commands: RefCell<BTreeSet<String>>,
    settings: RefCell<BTreeMap<(String, String), String>>,
    login_shell: RefCell<String>,
    enabled_extensions: RefCell<String>,
    free_space: u64,
}

impl FakeSystem {
    pub(crate) fn new() -> Self {
        Self {
            log: RefCell::new(Vec::new()),
            packages: RefCell::new(BTreeSet::new()),
            broken: BTreeSet::new(),
            snaps: RefCell::new(BTreeSet::new()),
            commands: RefCell::new(BTreeSet::new()),
            settings: RefCell::new(BTreeMap::new()),
            login_shell: RefCell::new("/bin/bash".into()),
            enabled_extensions: RefCell::new(String::new()),
            free_space: 64 * 1024 * 1024 * 1024,
        }
    }

    /// Bytes free on every filesystem.
    pub(crate) fn with_free_space(mut self, bytes: u64) -> Self {
        self.free_space = bytes;
        self
    }

    /// Packages that fail to install, and installers that exit unsuccessfully.
    pub(crate) fn with_broken(mut self, names: &[&str]) -> Self {
        self.broken = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub(crate) fn with_packages(self, names: &[&str]) -> Self {
        self.packages
            .borrow_mut()
            .extend(names.iter().map(|name| name.to_string()));
        self
    }

    /// Every invocation issued so far, as argument vectors.
    pub(crate) fn log(&self) -> Vec<Vec<String>> {
        self.log.borrow().clone()
    }

    pub(crate) fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }

    /// Invocations that change the machine.
    pub(crate) fn mutations(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|argv| {
                !READ_ONLY.iter().any(|prefix| {
                    argv.len() >= prefix.len() && argv.iter().zip(prefix.iter()).all(|(a, b)| a == b)
                })
            })
            .map(|argv| argv.join(" "))
            .collect()
    }

    /// Number of invocations starting with `argv`.
    pub(crate) fn count(&self, argv: &[&str]) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|logged| {
                logged.len() >= argv.len() && logged.iter().zip(argv.iter()).all(|(a, b)| a == b)
            })
            .count()
    }

    pub(crate) fn is_installed(&self, package: &str) -> bool {
        self.packages.borrow().contains(package)
    }

    pub(crate) fn login_shell(&self) -> String {
        self.login_shell.borrow().clone()
    }

    pub(crate) fn setting(&self, schema: &str, key: &str) -> Option<String> {
        self.settings
            .borrow()
            .get(&(schema.to_string(), key.to_string()))
            .cloned()
    }

    pub(crate) fn enabled_extensions(&self) -> String {
        self.enabled_extensions.borrow().clone()
    }

    fn record(&self, invocation: &Invocation) -> Vec<String> {
        let argv = invocation
            .argv()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        self.log.borrow_mut().push(argv.clone());
        argv
    }
}

impl System for FakeSystem {
    fn run(&self, invocation: &Invocation) -> SystemResult<Output> {
        let argv = self.record(invocation);
        let argv = argv.iter().map(String::as_str).collect::<Vec<_>>();

        let output = match argv.as_slice() {
            ["dpkg-query", "-W", _, package] => {
                if self.packages.borrow().contains(*package) {
                    Output::ok("install ok installed")
                } else {
                    Output::failed(format!("dpkg-query: no packages found matching {package}"))
                }
            }
            ["apt-get", "update"] => Output::ok("Reading package lists... Done\n"),
            ["apt-get", "install", "-y", package] => {
                if self.broken.contains(*package) {
                    Output::failed(format!("E: Unable to locate package {package}"))
                } else {
                    self.packages.borrow_mut().insert(package.to_string());
                    Output::ok("")
                }
            }
            ["getent", "passwd", user] => Output::ok(format!(
                "{user}:x:1000:1000:{user},,,:/home/{user}:{}\n",
                self.login_shell.borrow()
            )),
            ["chsh", "-s", shell, _] => {
                *self.login_shell.borrow_mut() = shell.to_string();
                Output::ok("")
            }
            ["snap", "list", name] => {
                if self.snaps.borrow().contains(*name) {
                    Output::ok(format!("Name  Version\n{name}  1.0\n"))
                } else {
                    Output::failed(format!("error: no matching snaps installed: {name}"))
                }
            }
            ["snap", "install", name, ..] => {
                self.snaps.borrow_mut().insert(name.to_string());
                Output::ok("")
            }
            ["gsettings", "get", schema, key] => match self.setting(schema, key) {
                Some(value) => Output::ok(format!("{value}\n")),
                None => Output::failed(format!("No such key \u{201c}{key}\u{201d}")),
            },
            ["gsettings", "set", schema, key, value] => {
                self.settings
                    .borrow_mut()
                    .insert((schema.to_string(), key.to_string()), value.to_string());
                Output::ok("")
            }
            ["gnome-shell", "--version"] => Output::ok("GNOME Shell 43.9\n"),
            ["dconf", "read", _] => Output::ok(format!("{}\n", self.enabled_extensions.borrow())),
            ["dconf", "write", _, value] => {
                *self.enabled_extensions.borrow_mut() = value.to_string();
                Output::ok("")
            }
            ["gnome-extensions", "enable", _] => {
                Output::failed("Extension does not exist in running session")
            }
            ["gpg", ..] | ["install", ..] | ["fc-cache", ..] => Output::ok(""),
            _ => {
                return Err(SystemError::Spawn {
                    program: invocation.program().to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
            }
        };

        Ok(output)
    }

    fn run_interactive(&self, invocation: &Invocation) -> SystemResult<bool> {
        let argv = self.record(invocation);

        // INVARIANT: Installer `<name>-installer.sh` provides command `<name>`.
        let name = argv
            .get(1)
            .and_then(|script| Path::new(script).file_name())
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix("-installer.sh"))
            .map(str::to_string);
        match name {
            Some(name) if !self.broken.contains(&name) => {
                self.commands.borrow_mut().insert(name);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.commands
            .borrow()
            .contains(program)
            .then(|| PathBuf::from("/usr/local/bin").join(program))
    }

    fn available_space(&self, _: &Path) -> SystemResult<u64> {
        Ok(self.free_space)
    }
}

#[derive(Debug, Default)]
struct TransportState {
    bodies: HashMap<String, Vec<u8>>,
    fetches: Vec<String>,
    offline: bool,
}

/// In-memory network serving canned bodies.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeTransport {
    state: Rc<RefCell<TransportState>>,
}

impl FakeTransport {
    pub(crate) fn offline() -> Self {
        let transport = Self::default();
        transport.state.borrow_mut().offline = true;
        transport
    }

    pub(crate) fn serve(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.state
            .borrow_mut()
            .bodies
            .insert(url.to_string(), body.into());
        self
    }

    /// Every URL fetched so far, in order.
    pub(crate) fn fetches(&self) -> Vec<String> {
        self.state.borrow().fetches.clone()
    }

    pub(crate) fn fetches_of(&self, url: &str) -> usize {
        self.state
            .borrow()
            .fetches
            .iter()
            .filter(|fetched| fetched.as_str() == url)
            .count()
    }
}

impl Transport for FakeTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.borrow_mut();
        state.fetches.push(url.to_string());
        if state.offline {
            return Err(TransportError::Unreachable {
                url: url.into(),
                reason: "network is unreachable".into(),
            });
        }

        state
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.into(),
                status: 404,
            })
    }

    fn reachable(&self, url: &str, _: Duration) -> Result<(), TransportError> {
        if self.state.borrow().offline {
            return Err(TransportError::Unreachable {
                url: url.into(),
                reason: "network is unreachable".into(),
            });
        }

        Ok(())
    }
}

/// Elevation that grants or denies without asking.
#[derive(Debug, Default)]
pub(crate) struct FakeElevation {
    deny: bool,
    acquired: Cell<u32>,
}

impl FakeElevation {
    pub(crate) fn denying() -> Self {
        Self {
            deny: true,
            acquired: Cell::new(0),
        }
    }

    pub(crate) fn acquired(&self) -> u32 {
        self.acquired.get()
    }
}

impl Elevation for FakeElevation {
    fn acquire(&self) -> PrivilegeResult<Lease> {
        self.acquired.set(self.acquired.get() + 1);
        if self.deny {
            return Err(PrivilegeError::Denied);
        }

        Ok(Lease::inert())
    }
}

/// Prompter answering from a fixed table of questions.
#[derive(Debug, Default)]
pub(crate) struct ScriptedPrompter {
    answers: HashMap<String, bool>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub(crate) fn answer(mut self, question: &str, answer: bool) -> Self {
        self.answers.insert(question.to_string(), answer);
        self
    }

    pub(crate) fn asked(&self) -> Vec<String> {
        self.asked.borrow().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str) -> Result<bool, InquireError> {
        self.asked.borrow_mut().push(question.to_string());
        self.answers
            .get(question)
            .copied()
            .ok_or(InquireError::OperationCanceled)
    }
}

/// Result of a single orchestrated run.
#[derive(Debug)]
pub(crate) struct RunReport {
    pub(crate) result: Result<RunSummary, RunError>,
    pub(crate) history: Vec<RunState>,
    pub(crate) summary: RunSummary,
    pub(crate) refreshes: u32,
}

/// Isolated home directory and download cache inside current directory.
#[derive(Debug)]
pub(crate) struct Sandbox {
    pub(crate) home: PathBuf,
    pub(crate) cache: PathBuf,
}

impl Sandbox {
    pub(crate) fn new() -> Result<Self> {
        let root = env::current_dir()?;
        let home = root.join("home");
        mkdirp::mkdirp(&home)?;

        Ok(Self {
            home,
            cache: root.join("cache"),
        })
    }

    pub(crate) fn downloader(&self, transport: &FakeTransport, retries: u32) -> Downloader {
        Downloader::new(
            Box::new(transport.clone()),
            DownloadCache::new(&self.cache),
            RetryPolicy::new(retries, Duration::ZERO),
        )
    }

    pub(crate) fn run(
        &self,
        definition: &SetupDefinition,
        system: &FakeSystem,
        downloader: &Downloader,
        elevation: &dyn Elevation,
        prompter: &dyn Prompter,
    ) -> Result<RunReport> {
        let catalog = Catalog::build(definition)?;
        Ok(self.run_catalog(&catalog, definition, system, downloader, elevation, prompter))
    }

    pub(crate) fn run_catalog(
        &self,
        catalog: &Catalog,
        definition: &SetupDefinition,
        system: &FakeSystem,
        downloader: &Downloader,
        elevation: &dyn Elevation,
        prompter: &dyn Prompter,
    ) -> RunReport {
        let mut ctx = Context::new(
            system,
            downloader,
            USER,
            &self.home,
            Reporter::new(ColorChoice::Never),
        );
        let mut orchestrator = Orchestrator::new(catalog, definition, elevation, prompter);
        let result = orchestrator.run(&mut ctx);

        RunReport {
            result,
            history: orchestrator.history().to_vec(),
            summary: orchestrator.summary().clone(),
            refreshes: ctx.packages.refreshes(),
        }
    }
}

/// Build zip archive holding given files.
pub(crate) fn zip_of(files: &[(&str, &str)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in files {
        writer.start_file(*name, options)?;
        writer.write_all(contents.as_bytes())?;
    }

    Ok(writer.finish()?.into_inner())
}

/// Bare git repository standing in for a plugin remote.
pub(crate) struct RemoteFixture {
    repo: Repository,
}

impl RemoteFixture {
    pub(crate) fn new(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(true);
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        // INVARIANT: Always provide valid name and email.
        //   - Git will complain if this is not set in CI/CD environments.
        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    pub(crate) fn stage_and_commit(
        &self,
        filename: impl AsRef<Path>,
        contents: impl AsRef<str>,
    ) -> Result<()> {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.as_ref().len() as u32,
            id: self.repo.blob(contents.as_ref().as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename
                .as_ref()
                .as_os_str()
                .to_string_lossy()
                .into_owned()
                .into_bytes(),
        };

        // INVARIANT: Always use new tree produced by index after staging new entry.
        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_ref().as_bytes())?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        // INVARIANT: Always determine latest parent commits to append to.
        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().and_then(|head| head.target()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            format!("chore: add {:?}", filename.as_ref()).as_ref(),
            &tree,
            &parents,
        )?;

        Ok(())
    }

    /// Clone URL of remote.
    pub(crate) fn url(&self) -> String {
        self.repo.path().to_string_lossy().into_owned()
    }
}

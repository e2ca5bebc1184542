// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Host system access.
//!
//! Every external program that a step needs to run goes through the
//! [`System`] trait. The host implementation shells out through
//! [`std::process::Command`], while tests substitute a scripted fake so that
//! no package manager or desktop service is ever touched.
//!
//! # Privileged Invocations
//!
//! An [`Invocation`] marked as privileged is prefixed with `sudo` unless the
//! current process already runs as root. The orchestrator keeps the sudo
//! timestamp alive for the duration of a run, so privileged invocations never
//! block on a password prompt mid-run.

use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tracing::debug;

/// Description of an external program to run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    privileged: bool,
}

impl Invocation {
    /// Construct new invocation of target program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the invoked program.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Mark invocation as requiring elevated privileges.
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Program followed by its arguments, without any privilege prefix.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

/// Render invocation as the command a user would type into a shell.
impl Display for Invocation {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        if self.privileged {
            fmt.write_str("sudo ")?;
            if !self.env.is_empty() {
                fmt.write_str("env ")?;
            }
        }

        for (key, value) in &self.env {
            write!(fmt, "{key}={} ", quote(value))?;
        }

        let argv = self.argv().into_iter().map(quote).collect::<Vec<_>>();
        fmt.write_str(&argv.join(" "))
    }
}

fn quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@+,%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Captured result of a finished invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl Output {
    /// Construct successful output with given standard output.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Construct failed output with given standard error.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Combined stdout and stderr with trailing newlines chomped.
    pub fn message(&self) -> String {
        let mut message = String::new();
        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        message.trim_end_matches(['\r', '\n']).to_string()
    }
}

/// Layer of indirection for host system access.
pub trait System {
    /// Run invocation to completion, capturing its output.
    ///
    /// A non-zero exit status is __not__ an error here, it is reported through
    /// [`Output::success`]. Only failing to spawn the program is an error.
    fn run(&self, invocation: &Invocation) -> Result<Output>;

    /// Run invocation attached to the current terminal.
    ///
    /// Returns whether the program exited successfully.
    fn run_interactive(&self, invocation: &Invocation) -> Result<bool>;

    /// Locate program on `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Amount of bytes available to unprivileged users on the filesystem
    /// holding `path`.
    fn available_space(&self, path: &Path) -> Result<u64>;

    /// Run invocation, and treat non-zero exit status as an error.
    ///
    /// # Errors
    ///
    /// - Return [`SystemError::Spawn`] if program cannot be started.
    /// - Return [`SystemError::Failed`] if program exits unsuccessfully.
    fn run_checked(&self, invocation: &Invocation) -> Result<String> {
        let output = self.run(invocation)?;
        if !output.success {
            return Err(SystemError::Failed {
                command: invocation.to_string(),
                message: output.message(),
            });
        }

        Ok(output.stdout)
    }

    /// Run invocation, and return whether it succeeded.
    ///
    /// Any failure, including failure to spawn, counts as `false`. Meant for
    /// detection predicates that must never fail hard.
    fn probe(&self, invocation: &Invocation) -> bool {
        match self.run(invocation) {
            Ok(output) => output.success,
            Err(error) => {
                debug!("probe {invocation} failed: {error}");
                false
            }
        }
    }
}

/// System access through the host operating system.
#[derive(Debug, Clone)]
pub struct HostSystem {
    elevated: bool,
}

impl HostSystem {
    /// Construct new host system access.
    ///
    /// Detects whether current process already runs as root, in which case
    /// privileged invocations are run directly instead of through sudo.
    pub fn new() -> Self {
        Self {
            elevated: nix::unistd::geteuid().is_root(),
        }
    }

    fn command(&self, invocation: &Invocation) -> Command {
        // INVARIANT: sudo resets the environment, so hand variables to env(1).
        if invocation.is_privileged() && !self.elevated {
            let mut command = Command::new("sudo");
            if !invocation.environment().is_empty() {
                command.arg("env");
                command.args(
                    invocation
                        .environment()
                        .iter()
                        .map(|(key, value)| format!("{key}={value}")),
                );
            }
            command.arg(invocation.program()).args(invocation.arguments());
            return command;
        }

        let mut command = Command::new(invocation.program());
        command.args(invocation.arguments());
        command.envs(
            invocation
                .environment()
                .iter()
                .map(|(key, value)| (OsStr::new(key), OsStr::new(value))),
        );
        command
    }
}

impl Default for HostSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for HostSystem {
    fn run(&self, invocation: &Invocation) -> Result<Output> {
        debug!("run {invocation}");
        let output = self
            .command(invocation)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| SystemError::Spawn {
                program: invocation.program().to_string(),
                source,
            })?;

        Ok(Output {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
        })
    }

    fn run_interactive(&self, invocation: &Invocation) -> Result<bool> {
        debug!("run interactive {invocation}");
        let status = self
            .command(invocation)
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|source| SystemError::Spawn {
                program: invocation.program().to_string(),
                source,
            })?;

        Ok(status.success())
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn available_space(&self, path: &Path) -> Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|source| SystemError::Statvfs {
            path: path.to_path_buf(),
            source,
        })?;

        let blocks = stat.blocks_available() as u64;
        let block_size = stat.fragment_size() as u64;
        Ok(blocks.saturating_mul(block_size))
    }
}

/// System access error types.
#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    /// Program cannot be spawned.
    #[error("failed to run {program:?}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Program exited unsuccessfully.
    #[error("command `{command}` failed:\n{message}")]
    Failed { command: String, message: String },

    /// Filesystem statistics cannot be queried.
    #[error("failed to query free space of {:?}", path.display())]
    Statvfs {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },
}

/// Friendly result alias :3
pub type Result<T, E = SystemError> = std::result::Result<T, E>;

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installed tool version summary.

use crate::{
    config::ToolEntry,
    report::Reporter,
    system::{Invocation, System},
};

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::debug;

/// Version line reported by a single tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    pub name: String,
    pub version: Option<String>,
}

impl Display for ToolVersion {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match &self.version {
            Some(version) => write!(fmt, "{:<16} {version}", self.name),
            None => write!(fmt, "{:<16} not installed", self.name),
        }
    }
}

/// Ask every configured tool for its version.
///
/// Never fails. A tool that is missing, fails, or prints nothing is reported
/// as not installed.
pub fn tool_versions(system: &dyn System, tools: &[ToolEntry]) -> Vec<ToolVersion> {
    tools
        .iter()
        .map(|tool| ToolVersion {
            name: tool.name.clone(),
            version: version_of(system, tool),
        })
        .collect()
}

fn version_of(system: &dyn System, tool: &ToolEntry) -> Option<String> {
    let args = match &tool.args {
        Some(args) => args.clone(),
        None => vec!["--version".to_string()],
    };
    let invocation = Invocation::new(tool.command.as_str()).args(args);

    match system.run(&invocation) {
        Ok(output) if output.success => first_line(&output.stdout)
            .or_else(|| first_line(&output.stderr))
            .map(str::to_string),
        Ok(output) => {
            debug!("{invocation} failed: {}", output.message());
            None
        }
        Err(error) => {
            debug!("{invocation} failed: {error}");
            None
        }
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}

/// Print version summary through reporter.
pub fn print(reporter: &Reporter, versions: &[ToolVersion]) {
    if versions.is_empty() {
        return;
    }

    reporter.heading("installed versions");
    for version in versions {
        reporter.note(version.to_string());
    }
}

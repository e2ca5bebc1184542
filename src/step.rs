// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Idempotent setup steps.
//!
//! A __step__ is one unit of check-then-install work. Every step can tell
//! whether its effect is already in place, and applying it again after it
//! succeeded must be harmless. The executor drives each step through the same
//! sequence:
//!
//! 1. Detect. If the step is already satisfied, skip it.
//! 2. Apply.
//! 3. Verify. By default this simply detects again.
//! 4. Report.
//!
//! Detection never fails hard. Anything that goes wrong while probing counts
//! as the effect being absent.

pub mod apt;
pub mod desktop;
pub mod dotfiles;
pub mod fonts;
pub mod plugins;
pub mod projects;
pub mod repository;
pub mod script;
pub mod shell;
pub mod snap;

use crate::{
    archive::ArchiveError, cache::CacheError, checksum::ChecksumError, context::Context,
    desktop::registry::RegistryError, desktop::DesktopError, disk::DiskError,
    download::DownloadError, link::LinkError, packages::PackageError, system::SystemError,
};

use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    path::PathBuf,
};
use tracing::{info, instrument, warn};

/// Whether failure of a step aborts the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    Required,
    Optional,
}

impl Criticality {
    pub fn from_required(required: bool) -> Self {
        if required {
            Self::Required
        } else {
            Self::Optional
        }
    }
}

impl Display for Criticality {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Required => fmt.write_str("required"),
            Self::Optional => fmt.write_str("optional"),
        }
    }
}

/// Why a step was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadySatisfied,
    Declined,
}

/// Result of running a single step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Installed,
    Failed { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl Display for Outcome {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Skipped(SkipReason::AlreadySatisfied) => fmt.write_str("already satisfied"),
            Self::Skipped(SkipReason::Declined) => fmt.write_str("declined"),
            Self::Installed => fmt.write_str("installed"),
            Self::Failed { reason } => write!(fmt, "failed: {reason}"),
        }
    }
}

/// Single idempotent unit of setup work.
pub trait Step {
    /// Unique name of step within a catalog.
    fn name(&self) -> &str;

    /// Kind of work step performs, e.g. `apt-packages`.
    fn kind(&self) -> &'static str;

    fn criticality(&self) -> Criticality;

    /// Name of gate guarding this step, if any.
    fn gate(&self) -> Option<&str> {
        None
    }

    /// One line description of what step sets up.
    fn summary(&self) -> String;

    /// Check whether step's effect is already in place.
    fn is_satisfied(&self, ctx: &Context<'_>) -> bool;

    /// Put step's effect in place.
    fn apply(&self, ctx: &mut Context<'_>) -> Result<()>;

    /// Check that step's effect is in place after applying it.
    fn verify(&self, ctx: &Context<'_>) -> bool {
        self.is_satisfied(ctx)
    }

    /// Exact command a user can run to do this step by hand.
    fn manual_hint(&self) -> Option<String> {
        None
    }
}

/// Read-only view of a step used for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    pub position: usize,
    pub name: String,
    pub kind: &'static str,
    pub criticality: Criticality,
    pub gate: Option<String>,
    pub summary: String,
}

impl StepDescriptor {
    pub fn of(position: usize, step: &dyn Step) -> Self {
        Self {
            position,
            name: step.name().to_string(),
            kind: step.kind(),
            criticality: step.criticality(),
            gate: step.gate().map(str::to_string),
            summary: step.summary(),
        }
    }
}

impl Display for StepDescriptor {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{:>2}. {} [{}, {}",
            self.position, self.name, self.kind, self.criticality
        )?;
        if let Some(gate) = &self.gate {
            write!(fmt, ", gate: {gate}")?;
        }
        write!(fmt, "] {}", self.summary)
    }
}

/// Drive step through detect, apply, verify, and report.
#[instrument(skip_all, fields(step = step.name()), level = "debug")]
pub fn execute(step: &dyn Step, ctx: &mut Context<'_>) -> Outcome {
    if step.is_satisfied(ctx) {
        ctx.reporter
            .skipped(format!("{}: already satisfied", step.name()));
        return Outcome::Skipped(SkipReason::AlreadySatisfied);
    }

    info!("apply step {}", step.name());
    let outcome = match step.apply(ctx) {
        Err(error) => Outcome::Failed {
            reason: error_chain(&error),
        },
        Ok(()) if !step.verify(ctx) => Outcome::Failed {
            reason: "post-condition not met".into(),
        },
        Ok(()) => Outcome::Installed,
    };

    match &outcome {
        Outcome::Installed => ctx.reporter.installed(format!("{}: installed", step.name())),
        Outcome::Failed { reason } => {
            warn!("step {} failed: {reason}", step.name());
            let hint = step.manual_hint();
            ctx.reporter
                .failure(format!("{}: {reason}", step.name()), hint.as_deref());
        }
        Outcome::Skipped(_) => {}
    }

    outcome
}

/// Render error and all of its sources on one line.
pub fn error_chain(error: &dyn Error) -> String {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(cause.to_string().as_str());
        source = cause.source();
    }

    chain
}

/// Step error types.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error(transparent)]
    System(#[from] SystemError),

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Disk(#[from] DiskError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Desktop(#[from] DesktopError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Glob pattern is malformed.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    /// Filesystem operation fails.
    #[error("filesystem operation failed at {:?}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Several items of a step fail.
    #[error("{count} item(s) failed:\n{details}")]
    Batch { count: usize, details: String },
}

impl StepError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = StepError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::TransportError;
    use pretty_assertions::assert_eq;

    #[test]
    fn error_chain_includes_sources() {
        let error = StepError::Download(DownloadError::Exhausted {
            url: "https://x.org/a.sh".into(),
            attempts: 3,
            last: TransportError::Status {
                url: "https://x.org/a.sh".into(),
                status: 404,
            },
        });

        assert_eq!(
            error_chain(&error),
            "failed to download https://x.org/a.sh after 3 attempt(s): https://x.org/a.sh answered with HTTP status 404"
        );
    }

    #[test]
    fn descriptor_renders_gate() {
        let descriptor = StepDescriptor {
            position: 6,
            name: "snaps".into(),
            kind: "snap-packages",
            criticality: Criticality::Optional,
            gate: Some("snaps".into()),
            summary: "spotify, code".into(),
        };
        assert_eq!(
            descriptor.to_string(),
            " 6. snaps [snap-packages, optional, gate: snaps] spotify, code"
        );
    }
}

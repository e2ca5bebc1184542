// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Run orchestration.
//!
//! A run walks through a fixed sequence of states:
//!
//! ```text
//! Init -> ConnectivityChecked -> PrivilegeAcquired -> PackageIndexFresh
//!      -> RunningStep(1) -> ... -> RunningStep(n) -> Done
//! ```
//!
//! Any failure before the first step, or the failure of a required step,
//! moves the run to `Aborted` instead. Nothing is rolled back. Optional step
//! failures are reported as warnings and the run carries on.

use crate::{
    catalog::{Catalog, CatalogError},
    config::SetupDefinition,
    context::Context,
    packages::PackageError,
    privilege::{Elevation, PrivilegeError},
    probe::{check_connectivity, ProbeError},
    step::{self, Criticality, Outcome, SkipReason, Step},
    summary,
};

use inquire::{Confirm, InquireError};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{info, instrument, warn};

/// Layer of indirection for asking the user yes/no questions.
pub trait Prompter {
    /// Ask question, and return whether the user agreed.
    fn confirm(&self, question: &str) -> Result<bool, InquireError>;
}

/// Ask questions on the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct InquirePrompter;

impl Prompter for InquirePrompter {
    fn confirm(&self, question: &str) -> Result<bool, InquireError> {
        Confirm::new(question).with_default(true).prompt()
    }
}

/// Answer yes to every question without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Prompter for AssumeYes {
    fn confirm(&self, question: &str) -> Result<bool, InquireError> {
        info!("assume yes: {question}");
        Ok(true)
    }
}

/// State of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    ConnectivityChecked,
    PrivilegeAcquired,
    PackageIndexFresh,

    /// Running step at given position, counting from one.
    RunningStep(usize),
    Done,
    Aborted,
}

impl Display for RunState {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Init => fmt.write_str("init"),
            Self::ConnectivityChecked => fmt.write_str("connectivity checked"),
            Self::PrivilegeAcquired => fmt.write_str("privilege acquired"),
            Self::PackageIndexFresh => fmt.write_str("package index fresh"),
            Self::RunningStep(position) => write!(fmt, "running step {position}"),
            Self::Done => fmt.write_str("done"),
            Self::Aborted => fmt.write_str("aborted"),
        }
    }
}

/// Outcome of one step within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub criticality: Criticality,
    pub outcome: Outcome,
}

impl Display for StepRecord {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.name, self.outcome)
    }
}

/// Outcomes of every step a run reached.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub records: Vec<StepRecord>,
}

impl RunSummary {
    pub fn installed(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Installed))
    }

    pub fn satisfied(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped(SkipReason::AlreadySatisfied)))
    }

    pub fn declined(&self) -> usize {
        self.count(|outcome| matches!(outcome, Outcome::Skipped(SkipReason::Declined)))
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::is_failure)
    }

    /// Find record of step by name.
    pub fn outcome_of(&self, name: &str) -> Option<&Outcome> {
        self.records
            .iter()
            .find(|record| record.name == name)
            .map(|record| &record.outcome)
    }

    fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.records
            .iter()
            .filter(|record| predicate(&record.outcome))
            .count()
    }
}

impl Display for RunSummary {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{} installed, {} already satisfied, {} declined, {} failed",
            self.installed(),
            self.satisfied(),
            self.declined(),
            self.failed()
        )
    }
}

/// Drives a catalog of steps through a single run.
pub struct Orchestrator<'run> {
    catalog: &'run Catalog,
    definition: &'run SetupDefinition,
    elevation: &'run dyn Elevation,
    prompter: &'run dyn Prompter,
    state: RunState,
    history: Vec<RunState>,
    answers: HashMap<String, bool>,
    summary: RunSummary,
}

impl<'run> Orchestrator<'run> {
    pub fn new(
        catalog: &'run Catalog,
        definition: &'run SetupDefinition,
        elevation: &'run dyn Elevation,
        prompter: &'run dyn Prompter,
    ) -> Self {
        Self {
            catalog,
            definition,
            elevation,
            prompter,
            state: RunState::Init,
            history: vec![RunState::Init],
            answers: HashMap::new(),
            summary: RunSummary::default(),
        }
    }

    /// Current state of run.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state run passed through, in order.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Outcomes of steps reached so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run every step of catalog in order.
    ///
    /// The privilege lease is held for the whole run, and released before
    /// returning, whatever the result.
    ///
    /// # Errors
    ///
    /// - Return [`RunError::Offline`] if no probe URL is reachable.
    /// - Return [`RunError::Privilege`] if privileges cannot be acquired.
    /// - Return [`RunError::PackageIndex`] if initial package index refresh
    ///   fails.
    /// - Return [`RunError::Prompt`] if a gate question cannot be asked.
    /// - Return [`RunError::StepFailed`] if a required step fails.
    #[instrument(skip_all, level = "debug")]
    pub fn run(&mut self, ctx: &mut Context<'_>) -> Result<RunSummary> {
        let result = self.run_steps(ctx);
        match &result {
            Ok(()) => self.transition(RunState::Done),
            Err(error) => {
                warn!("run aborted: {error}");
                self.transition(RunState::Aborted);
            }
        }

        if !self.summary.records.is_empty() {
            ctx.reporter.heading(format!("summary: {}", self.summary));
            for record in &self.summary.records {
                match &record.outcome {
                    Outcome::Installed => ctx.reporter.installed(record.to_string()),
                    Outcome::Skipped(_) => ctx.reporter.skipped(record.to_string()),
                    Outcome::Failed { .. } => ctx.reporter.warning(record.to_string()),
                }
            }
        }
        result?;

        let versions = summary::tool_versions(ctx.system, &self.definition.summary);
        summary::print(&ctx.reporter, &versions);

        Ok(self.summary.clone())
    }

    fn run_steps(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        let network = &self.definition.network;
        let reached = check_connectivity(
            ctx.downloader.transport(),
            &network.probe_urls,
            self.definition.probe_timeout(),
        )?;
        info!("online through {reached}");
        self.transition(RunState::ConnectivityChecked);

        let lease = self.elevation.acquire()?;
        self.transition(RunState::PrivilegeAcquired);

        ctx.packages.refresh(ctx.system, false)?;
        self.transition(RunState::PackageIndexFresh);

        let catalog = self.catalog;
        for (index, step) in catalog.steps().iter().enumerate() {
            self.transition(RunState::RunningStep(index + 1));
            let step = step.as_ref();

            let outcome = if self.gate_allows(step)? {
                step::execute(step, ctx)
            } else {
                ctx.reporter.skipped(format!("{}: declined", step.name()));
                Outcome::Skipped(SkipReason::Declined)
            };

            self.summary.records.push(StepRecord {
                name: step.name().to_string(),
                criticality: step.criticality(),
                outcome: outcome.clone(),
            });

            if let Outcome::Failed { reason } = outcome {
                match step.criticality() {
                    Criticality::Required => {
                        return Err(RunError::StepFailed {
                            step: step.name().to_string(),
                            reason,
                        });
                    }
                    Criticality::Optional => {
                        ctx.reporter
                            .warning(format!("optional step {} failed, continuing", step.name()));
                    }
                }
            }
        }

        lease.release();
        Ok(())
    }

    /// Ask gate question of step at most once per run.
    fn gate_allows(&mut self, step: &dyn Step) -> Result<bool> {
        let Some(gate) = step.gate() else {
            return Ok(true);
        };

        if let Some(answer) = self.answers.get(gate) {
            return Ok(*answer);
        }

        let question = self.definition.gates.get(gate).ok_or_else(|| {
            CatalogError::UnknownGate {
                step: step.name().to_string(),
                gate: gate.to_string(),
            }
        })?;
        let answer = self
            .prompter
            .confirm(question)
            .map_err(|source| RunError::Prompt {
                gate: gate.to_string(),
                source,
            })?;
        info!("gate {gate} answered {}", if answer { "yes" } else { "no" });
        self.answers.insert(gate.to_string(), answer);

        Ok(answer)
    }

    fn transition(&mut self, next: RunState) {
        info!("{} -> {next}", self.state);
        self.state = next;
        self.history.push(next);
    }
}

impl std::fmt::Debug for Orchestrator<'_> {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("answers", &self.answers)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Run error types.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Offline(#[from] ProbeError),

    #[error("failed to acquire privileges")]
    Privilege(#[from] PrivilegeError),

    #[error("failed to refresh package index")]
    PackageIndex(#[from] PackageError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Gate question cannot be asked.
    #[error("failed to ask question for gate {gate:?}")]
    Prompt {
        gate: String,
        #[source]
        source: InquireError,
    },

    /// Required step fails.
    #[error("required step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },
}

/// Friendly result alias :3
pub type Result<T, E = RunError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn summary_counts_outcomes() {
        let record = |name: &str, outcome: Outcome| StepRecord {
            name: name.into(),
            criticality: Criticality::Optional,
            outcome,
        };
        let summary = RunSummary {
            records: vec![
                record("base-packages", Outcome::Installed),
                record("shell", Outcome::Skipped(SkipReason::AlreadySatisfied)),
                record("snaps", Outcome::Skipped(SkipReason::Declined)),
                record("fonts", Outcome::Failed { reason: "no space".into() }),
                record("projects", Outcome::Installed),
            ],
        };

        assert_eq!(
            summary.to_string(),
            "2 installed, 1 already satisfied, 1 declined, 1 failed"
        );
        assert_eq!(
            summary.outcome_of("fonts"),
            Some(&Outcome::Failed { reason: "no space".into() })
        );
        assert_eq!(summary.outcome_of("dotfiles"), None);
    }

    #[test]
    fn state_renders_position() {
        assert_eq!(RunState::RunningStep(3).to_string(), "running step 3");
        assert_eq!(RunState::PackageIndexFresh.to_string(), "package index fresh");
    }
}

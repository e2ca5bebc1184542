// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Colored status reporting.
//!
//! User-facing status lines are kept apart from tracing logs. Logs describe
//! what the program is doing, status lines tell the user what happened to
//! each step of their setup.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Kind of status line to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Heading,
    Installed,
    Skipped,
    Warning,
    Failure,
    Note,
}

impl Status {
    fn spec(self) -> ColorSpec {
        let mut spec = ColorSpec::new();
        match self {
            Self::Heading => spec.set_fg(Some(Color::Cyan)).set_bold(true),
            Self::Installed => spec.set_fg(Some(Color::Green)),
            Self::Skipped => spec.set_fg(Some(Color::Cyan)),
            Self::Warning => spec.set_fg(Some(Color::Yellow)),
            Self::Failure => spec.set_fg(Some(Color::Red)).set_bold(true),
            Self::Note => &mut spec,
        };
        spec
    }

    fn marker(self) -> &'static str {
        match self {
            Self::Heading => "==>",
            Self::Installed => "[ok]",
            Self::Skipped => "[skip]",
            Self::Warning => "[warn]",
            Self::Failure => "[fail]",
            Self::Note => "    ",
        }
    }
}

/// Colored status line printer.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    choice: ColorChoice,
}

impl Reporter {
    /// Construct new reporter with target color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self { choice }
    }

    /// Print status line.
    ///
    /// Failing to write to standard output is ignored, status lines are not
    /// worth aborting a run over.
    pub fn status(&self, status: Status, message: impl AsRef<str>) {
        let mut stdout = StandardStream::stdout(self.choice);
        let _ = stdout.set_color(&status.spec());
        let _ = write!(stdout, "{}", status.marker());
        let _ = stdout.reset();
        let _ = writeln!(stdout, " {}", message.as_ref());
    }

    pub fn heading(&self, message: impl AsRef<str>) {
        self.status(Status::Heading, message);
    }

    pub fn installed(&self, message: impl AsRef<str>) {
        self.status(Status::Installed, message);
    }

    pub fn skipped(&self, message: impl AsRef<str>) {
        self.status(Status::Skipped, message);
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.status(Status::Warning, message);
    }

    pub fn note(&self, message: impl AsRef<str>) {
        self.status(Status::Note, message);
    }

    /// Print failure with manual command the user can run instead.
    pub fn failure(&self, message: impl AsRef<str>, hint: Option<&str>) {
        self.status(Status::Failure, message);
        if let Some(hint) = hint {
            self.note(format!("run manually: {hint}"));
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}

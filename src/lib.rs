// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Zorin OS desktop setup.
//!
//! Configure a fresh Zorin OS desktop from a declarative setup definition.
//! A run is an ordered list of idempotent __steps__, each of which checks
//! whether its effect is already in place before doing anything. Running the
//! whole thing twice is harmless, the second run skips every step.
//!
//! Every external effect goes through a small set of seams:
//! [`system::System`] for running programs, [`download::Transport`] for HTTP,
//! [`privilege::Elevation`] for sudo, and [`orchestrator::Prompter`] for
//! questions asked on the terminal.

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod context;
pub mod desktop;
pub mod disk;
pub mod download;
pub mod link;
pub mod orchestrator;
pub mod packages;
pub mod path;
pub mod privilege;
pub mod probe;
pub mod report;
pub mod step;
pub mod summary;
pub mod system;

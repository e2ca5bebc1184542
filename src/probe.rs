// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Internet connectivity probe.

use crate::download::Transport;

use std::time::Duration;
use tracing::{debug, info, instrument};

/// Check that at least one probe URL is reachable.
///
/// URLs are tried in order, and the first reachable one wins.
///
/// # Errors
///
/// - Return [`ProbeError::NoProbes`] if no URL was given.
/// - Return [`ProbeError::Offline`] if no URL is reachable.
#[instrument(skip(transport, urls), level = "debug")]
pub fn check_connectivity(
    transport: &dyn Transport,
    urls: &[String],
    timeout: Duration,
) -> Result<String> {
    if urls.is_empty() {
        return Err(ProbeError::NoProbes);
    }

    for url in urls {
        match transport.reachable(url, timeout) {
            Ok(()) => {
                info!("network reachable through {url}");
                return Ok(url.clone());
            }
            Err(error) => debug!("probe {url} failed: {error}"),
        }
    }

    Err(ProbeError::Offline {
        tried: urls.join(", "),
    })
}

/// Connectivity probe error types.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// No probe URL reachable.
    #[error("no internet connection, none of these hosts answered: {tried}")]
    Offline { tried: String },

    /// No probe URL configured.
    #[error("no connectivity probe URLs configured")]
    NoProbes,
}

/// Friendly result alias :3
pub type Result<T, E = ProbeError> = std::result::Result<T, E>;

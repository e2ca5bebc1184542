// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Privilege keep-alive.
//!
//! A run asks for the user's password once. After that, a background thread
//! keeps the sudo timestamp fresh by renewing it non-interactively at an
//! interval shorter than the sudo timeout. The thread lives exactly as long
//! as the [`Lease`] that owns it.

use std::{
    process::{Command, Stdio},
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

/// Time-bounded privilege grant renewed in the background.
#[derive(Debug)]
pub struct Lease {
    stop: Option<Sender<()>>,
    renewer: Option<JoinHandle<()>>,
}

impl Lease {
    /// Construct lease that renews nothing.
    pub fn inert() -> Self {
        Self {
            stop: None,
            renewer: None,
        }
    }

    /// Construct lease that calls `renew` every `interval`.
    ///
    /// Renewal stops once the lease is released or dropped, or once `renew`
    /// returns `false`.
    ///
    /// # Errors
    ///
    /// - Return [`PrivilegeError::Spawn`] if renewal thread cannot be spawned.
    pub fn spawn(
        interval: Duration,
        mut renew: impl FnMut() -> bool + Send + 'static,
    ) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let renewer = thread::Builder::new()
            .name("privilege-keepalive".into())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if !renew() {
                            warn!("privilege renewal rejected, stop keep-alive");
                            break;
                        }
                        debug!("privilege renewed");
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(PrivilegeError::Spawn)?;

        Ok(Self {
            stop: Some(stop),
            renewer: Some(renewer),
        })
    }

    /// Check whether a renewal thread is attached.
    pub fn is_active(&self) -> bool {
        self.renewer
            .as_ref()
            .is_some_and(|renewer| !renewer.is_finished())
    }

    /// Stop renewing and wait for the renewal thread to exit.
    pub fn release(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        if let Some(renewer) = self.renewer.take() {
            if renewer.join().is_err() {
                warn!("privilege keep-alive thread panicked");
            }
        }
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Layer of indirection for acquiring elevated privileges.
pub trait Elevation {
    /// Acquire a privilege lease for the duration of a run.
    fn acquire(&self) -> Result<Lease>;
}

/// Elevation through sudo.
#[derive(Debug, Clone)]
pub struct Sudo {
    keepalive: Duration,
}

impl Sudo {
    /// Construct new sudo elevation renewing every `keepalive`.
    pub fn new(keepalive: Duration) -> Self {
        Self { keepalive }
    }
}

impl Default for Sudo {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl Elevation for Sudo {
    /// Validate sudo credentials once, then keep them alive.
    ///
    /// The lease is inert when the process already runs as root.
    ///
    /// # Errors
    ///
    /// - Return [`PrivilegeError::Prompt`] if sudo cannot be run.
    /// - Return [`PrivilegeError::Denied`] if sudo rejects the credentials.
    /// - Return [`PrivilegeError::Spawn`] if renewal thread cannot be spawned.
    #[instrument(skip(self), level = "debug")]
    fn acquire(&self) -> Result<Lease> {
        if nix::unistd::geteuid().is_root() {
            debug!("already running as root, no keep-alive needed");
            return Ok(Lease::inert());
        }

        info!("requesting administrator privileges");
        let status = Command::new("sudo")
            .arg("-v")
            .status()
            .map_err(PrivilegeError::Prompt)?;
        if !status.success() {
            return Err(PrivilegeError::Denied);
        }

        Lease::spawn(self.keepalive, || {
            Command::new("sudo")
                .args(["-n", "-v"])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .is_ok_and(|status| status.success())
        })
    }
}

/// Elevation that never asks for anything.
///
/// Used for commands that do not mutate the system, and for tests.
#[derive(Debug, Default, Clone)]
pub struct Unprivileged;

impl Elevation for Unprivileged {
    fn acquire(&self) -> Result<Lease> {
        Ok(Lease::inert())
    }
}

/// Privilege error types.
#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    /// Sudo cannot be started.
    #[error("failed to run sudo")]
    Prompt(#[source] std::io::Error),

    /// Sudo rejected the credentials.
    #[error("administrator privileges were not granted")]
    Denied,

    /// Keep-alive thread cannot be spawned.
    #[error("failed to spawn privilege keep-alive thread")]
    Spawn(#[source] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = PrivilegeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    #[test]
    fn lease_renews_until_released() -> anyhow::Result<()> {
        let renewals = Arc::new(AtomicUsize::new(0));
        let counter = renewals.clone();
        let lease = Lease::spawn(Duration::from_millis(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        })?;

        while renewals.load(Ordering::SeqCst) < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(lease.is_active());
        lease.release();

        let after_release = renewals.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(renewals.load(Ordering::SeqCst), after_release);

        Ok(())
    }

    #[test]
    fn rejected_renewal_stops_thread() -> anyhow::Result<()> {
        let lease = Lease::spawn(Duration::from_millis(1), || false)?;
        while lease.is_active() {
            thread::sleep(Duration::from_millis(1));
        }
        drop(lease);

        Ok(())
    }

    #[test]
    fn unprivileged_lease_is_inert() -> anyhow::Result<()> {
        assert!(!Unprivileged.acquire()?.is_active());
        Ok(())
    }
}

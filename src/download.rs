// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Retrying, caching downloads.
//!
//! Network access is split in two layers. A [`Transport`] performs exactly one
//! attempt at fetching a URL, and knows nothing about retries or caching. The
//! [`Downloader`] wraps a transport with a fixed attempt budget, a fixed delay
//! between attempts, and the [`DownloadCache`].
//!
//! # Retry Semantics
//!
//! There is no backoff. A download gets `max_retries` attempts with the same
//! delay between each of them, and no delay after the final attempt. Every
//! transport failure counts against the budget, including HTTP error
//! statuses.

use crate::cache::{create_parent, CacheError, DownloadCache};

use std::{
    cmp::max,
    fs,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tracing::{debug, info, instrument, warn};

const USER_AGENT: &str = concat!("zorin-setup/", env!("CARGO_PKG_VERSION"));

/// Timeouts bounding a single transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub overall: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            overall: Duration::from_secs(300),
        }
    }
}

/// Layer of indirection for network access.
pub trait Transport {
    /// Fetch the full body of `url` in one attempt.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Check that `url` answers within `timeout`.
    fn reachable(&self, url: &str, timeout: Duration) -> Result<(), TransportError>;
}

/// Network access over HTTPS through reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Construct new HTTP transport.
    ///
    /// # Errors
    ///
    /// - Return [`TransportError::Client`] if TLS backend cannot be set up.
    pub fn new(timeouts: Timeouts) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.overall)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Client)?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|source| TransportError::Request {
                url: url.into(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.into(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| TransportError::Request {
            url: url.into(),
            source,
        })?;

        Ok(bytes.to_vec())
    }

    fn reachable(&self, url: &str, timeout: Duration) -> Result<(), TransportError> {
        self.client
            .head(url)
            .timeout(timeout)
            .send()
            .map(|_| ())
            .map_err(|source| TransportError::Request {
                url: url.into(),
                source,
            })
    }
}

/// Attempt budget for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Construct new retry policy.
    ///
    /// A budget of zero attempts is bumped to one.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max(max_retries, 1),
            delay,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

/// Where a downloaded artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    /// Served from the download cache, no transport call made.
    Cached,

    /// Fetched over the network after given number of attempts.
    Network { attempts: u32 },
}

/// Retrying, caching downloader.
pub struct Downloader {
    transport: Box<dyn Transport>,
    cache: DownloadCache,
    policy: RetryPolicy,
}

impl Downloader {
    /// Construct new downloader.
    pub fn new(transport: Box<dyn Transport>, cache: DownloadCache, policy: RetryPolicy) -> Self {
        Self {
            transport,
            cache,
            policy,
        }
    }

    pub fn cache(&self) -> &DownloadCache {
        &self.cache
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Download `url` into `dest`.
    ///
    /// The cache is consulted first using the file name of `dest` as the key.
    /// On a hit the cached bytes are copied to `dest` without touching the
    /// network. On a miss the URL is fetched, stored in the cache, and then
    /// written to `dest`.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::InvalidDestination`] if `dest` has no usable
    ///   file name.
    /// - Return [`DownloadError::Exhausted`] if every attempt fails.
    /// - Return [`DownloadError::Cache`] if cache cannot be read or written.
    /// - Return [`DownloadError::Write`] if `dest` cannot be written.
    #[instrument(skip(self, dest), level = "debug")]
    pub fn download(&self, url: &str, dest: &Path) -> Result<Fetched> {
        let key = dest
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| DownloadError::InvalidDestination(dest.to_path_buf()))?;

        if self.cache.restore(key, dest)? {
            info!("using cached {key}");
            return Ok(Fetched::Cached);
        }

        let (bytes, attempts) = self.fetch_with_retry(url)?;
        self.cache.store(key, &bytes)?;
        create_parent(dest)?;
        fs::write(dest, &bytes).map_err(|source| DownloadError::Write {
            path: dest.to_path_buf(),
            source,
        })?;
        info!("downloaded {url} to {:?}", dest.display());

        Ok(Fetched::Network { attempts })
    }

    /// Fetch body of `url` with retries, bypassing the cache.
    ///
    /// # Errors
    ///
    /// - Return [`DownloadError::Exhausted`] if every attempt fails.
    #[instrument(skip(self), level = "debug")]
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.fetch_with_retry(url).map(|(bytes, _)| bytes)
    }

    fn fetch_with_retry(&self, url: &str) -> Result<(Vec<u8>, u32)> {
        let attempts = self.policy.max_retries();
        let mut attempt = 1;
        loop {
            debug!("fetch {url} (attempt {attempt}/{attempts})");
            match self.transport.fetch(url) {
                Ok(bytes) => return Ok((bytes, attempt)),
                Err(error) if attempt >= attempts => {
                    return Err(DownloadError::Exhausted {
                        url: url.into(),
                        attempts,
                        last: error,
                    });
                }
                Err(error) => {
                    warn!("attempt {attempt}/{attempts} at {url} failed: {error}");
                    thread::sleep(self.policy.delay());
                    attempt += 1;
                }
            }
        }
    }
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("Downloader")
            .field("cache", &self.cache)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Single attempt transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// HTTP client cannot be constructed.
    #[error("failed to set up HTTP client")]
    Client(#[source] reqwest::Error),

    /// Request failed before a response arrived.
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with an error status.
    #[error("{url} answered with HTTP status {status}")]
    Status { url: String, status: u16 },

    /// Host could not be reached at all.
    #[error("{url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },
}

/// Download error types.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Every attempt failed.
    #[error("failed to download {url} after {attempts} attempt(s)")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: TransportError,
    },

    /// Destination has no file name to key the cache with.
    #[error("download destination {:?} has no usable file name", .0.display())]
    InvalidDestination(PathBuf),

    /// Destination cannot be written.
    #[error("failed to write download to {:?}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Download cache failure.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Friendly result alias :3
pub type Result<T, E = DownloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{cell::RefCell, collections::VecDeque, rc::Rc};

    #[derive(Clone, Default)]
    struct ScriptedTransport {
        replies: Rc<RefCell<VecDeque<Option<Vec<u8>>>>>,
        calls: Rc<RefCell<u32>>,
    }

    impl ScriptedTransport {
        fn reply(self, reply: Option<&[u8]>) -> Self {
            self.replies.borrow_mut().push_back(reply.map(<[u8]>::to_vec));
            self
        }
    }

    impl Transport for ScriptedTransport {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportError> {
            *self.calls.borrow_mut() += 1;
            match self.replies.borrow_mut().pop_front().flatten() {
                Some(bytes) => Ok(bytes),
                None => Err(TransportError::Unreachable {
                    url: url.into(),
                    reason: "connection refused".into(),
                }),
            }
        }

        fn reachable(&self, _: &str, _: Duration) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn downloader(transport: &ScriptedTransport, retries: u32) -> Downloader {
        Downloader::new(
            Box::new(transport.clone()),
            DownloadCache::new("cache"),
            RetryPolicy::new(retries, Duration::ZERO),
        )
    }

    #[sealed_test]
    fn retries_until_success() -> anyhow::Result<()> {
        let transport = ScriptedTransport::default()
            .reply(None)
            .reply(Some(b"payload"));
        let fetched = downloader(&transport, 3).download("https://x.org/a.sh", Path::new("a.sh"))?;

        assert_eq!(fetched, Fetched::Network { attempts: 2 });
        assert_eq!(*transport.calls.borrow(), 2);
        assert_eq!(fs::read("a.sh")?, b"payload");
        assert_eq!(fs::read("cache/a.sh")?, b"payload");

        Ok(())
    }

    #[sealed_test]
    fn fetch_bytes_bypasses_cache() -> anyhow::Result<()> {
        let transport = ScriptedTransport::default()
            .reply(Some(b"{}"))
            .reply(Some(b"{}"));
        let downloader = downloader(&transport, 1);
        downloader.fetch_bytes("https://x.org/api")?;
        downloader.fetch_bytes("https://x.org/api")?;

        assert_eq!(*transport.calls.borrow(), 2);
        assert!(!Path::new("cache").exists());

        Ok(())
    }

    #[test]
    fn delay_only_between_attempts() {
        let transport = ScriptedTransport::default();
        let delay = Duration::from_millis(150);
        let downloader = Downloader::new(
            Box::new(transport.clone()),
            DownloadCache::new("cache"),
            RetryPolicy::new(3, delay),
        );

        let start = std::time::Instant::now();
        let result = downloader.fetch_bytes("https://x.org/offline");
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(DownloadError::Exhausted { attempts: 3, .. })));
        assert_eq!(*transport.calls.borrow(), 3);
        assert!(elapsed >= delay * 2, "slept {elapsed:?}, expected two delays");
        assert!(elapsed < delay * 3, "slept {elapsed:?}, expected no delay after last attempt");
    }

    #[test]
    fn zero_retries_means_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_retries(), 1);
    }
}

//! Fetching a streamed track's bytes.
//!
//! Locators are either http(s) URLs, fetched with `reqwest`, or filesystem
//! paths, read with `tokio::fs`. The scheduler fetches each locator at most
//! once and caches the decoded result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::debug;

use super::error::SoundError;
use super::presets::is_remote;

#[allow(async_fn_in_trait)]
pub trait TrackFetcher: 'static {
    /// Returns the complete encoded file behind `locator`.
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, SoundError>;
}

/// Limit for a whole remote track download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Limit for establishing the connection to a remote host.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches from the network or the local filesystem.
#[derive(Debug, Clone)]
pub struct AssetFetcher {
    client: reqwest::Client,
}

impl AssetFetcher {
    /// # Errors
    ///
    /// Returns `FetchFailed` if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SoundError> {
        Self::with_timeouts(FETCH_TIMEOUT, CONNECT_TIMEOUT)
    }

    /// # Errors
    ///
    /// Returns `FetchFailed` if the HTTP client cannot be built.
    pub fn with_timeouts(timeout: Duration, connect_timeout: Duration) -> Result<Self, SoundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SoundError::FetchFailed(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch_remote(&self, url: &str) -> Result<Vec<u8>, SoundError> {
        let failed = |e: reqwest::Error| {
            if e.is_timeout() {
                SoundError::FetchFailed(format!("{}: timed out", url))
            } else {
                SoundError::FetchFailed(format!("{}: {}", url, e))
            }
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(failed)?;
        let bytes = response.bytes().await.map_err(failed)?;
        Ok(bytes.to_vec())
    }
}

impl TrackFetcher for AssetFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, SoundError> {
        debug!("Fetching track: {}", locator);
        if is_remote(locator) {
            self.fetch_remote(locator).await
        } else {
            tokio::fs::read(locator)
                .await
                .map_err(|e| SoundError::FetchFailed(format!("{}: {}", locator, e)))
        }
    }
}

/// Mock fetcher for testing.
///
/// Clones share state, so a test can keep one clone for assertions while
/// the scheduler owns the other.
#[derive(Debug, Clone, Default)]
pub struct MockTrackFetcher {
    tracks: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<Vec<String>>>,
    delay: Option<Duration>,
}

impl MockTrackFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the bytes returned for `locator`.
    #[must_use]
    pub fn with_track(self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.tracks.lock().unwrap().insert(locator.into(), bytes);
        self
    }

    /// Makes every fetch take `delay` before completing.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    #[must_use]
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl TrackFetcher for MockTrackFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, SoundError> {
        self.calls.lock().unwrap().push(locator.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.tracks
            .lock()
            .unwrap()
            .get(locator)
            .cloned()
            .ok_or_else(|| SoundError::FetchFailed(format!("{}: not found", locator)))
    }
}

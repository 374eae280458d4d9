//! Parallel artifact downloads into the cache
//!
//! Within one process there is at most one in-flight fetch per cache key:
//! concurrent requests join the outstanding download through a single-flight
//! cell. Fan-out is bounded by the configured parallelism, transient network
//! failures retry with exponential backoff, and a checksum mismatch is a hard
//! error that never publishes the bytes under the final cache key.

use crate::cache::{sha256_digest, ArtifactCache, CacheKey};
use crate::config::NetworkConfig;
use crate::error::{JavelinError, JavelinResult};
use crate::registry::client::join_url;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// One artifact GET. `Ok(None)` is a permanent not-found; transport and
/// server failures are `Err` and may be retried by the caller.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> JavelinResult<Option<Vec<u8>>>;
}

/// What to download: a key, where it lives, and the expected checksum when
/// one is already recorded (lock file entries carry one)
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub key: CacheKey,
    pub repository: String,
    pub expected: Option<String>,
}

/// A verified cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub key: CacheKey,
    pub path: PathBuf,
    /// `sha256:<hex>`, verified against the expected checksum when known
    pub checksum: String,
    /// false when the cache already held the entry
    pub fetched: bool,
}

/// Normalize a checksum to its bare hex digest: strips an optional
/// `sha256:` prefix and trailing annotations (`<hex>  filename` sidecars).
fn normalize_checksum(raw: &str) -> Option<String> {
    let token = raw.trim().split_whitespace().next()?;
    let hex = token.strip_prefix("sha256:").unwrap_or(token).to_lowercase();
    let valid = hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit());
    valid.then_some(hex)
}

/// Callback invoked as each artifact becomes available
pub type ProgressFn = Arc<dyn Fn(&CacheKey) + Send + Sync>;

/// Downloads resolved artifacts into the shared cache
pub struct DownloadManager<F: Fetcher> {
    cache: ArtifactCache,
    fetcher: Arc<F>,
    max_parallel: usize,
    retry_attempts: u32,
    progress: Option<ProgressFn>,
    in_flight: Mutex<HashMap<CacheKey, Arc<OnceCell<Arc<DownloadOutcome>>>>>,
}

impl<F: Fetcher> DownloadManager<F> {
    pub fn new(cache: ArtifactCache, fetcher: Arc<F>, network: &NetworkConfig) -> Self {
        Self {
            cache,
            fetcher,
            max_parallel: network.max_parallel.max(1),
            retry_attempts: network.retry_attempts.max(1),
            progress: None,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Report per-artifact completion through a callback.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cache(&self) -> &ArtifactCache {
        &self.cache
    }

    /// Ensure every requested artifact is present and verified in the cache.
    /// Outcomes come back in key order regardless of completion order.
    pub async fn ensure_all(
        &self,
        requests: Vec<DownloadRequest>,
    ) -> JavelinResult<Vec<DownloadOutcome>> {
        let futures: Vec<_> = requests
            .into_iter()
            .map(|request| async move {
                let outcome = self.ensure(request).await?;
                if let Some(progress) = &self.progress {
                    progress(&outcome.key);
                }
                Ok::<_, JavelinError>(outcome)
            })
            .collect();

        let mut outcomes: Vec<DownloadOutcome> = stream::iter(futures)
            .buffer_unordered(self.max_parallel)
            .try_collect()
            .await?;

        outcomes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(outcomes)
    }

    /// Ensure one artifact, joining any in-flight download of the same key.
    pub async fn ensure(&self, request: DownloadRequest) -> JavelinResult<DownloadOutcome> {
        let cell = {
            let mut in_flight = self.in_flight.lock().expect("in-flight map poisoned");
            in_flight
                .entry(request.key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let outcome = cell
            .get_or_try_init(|| async { self.perform(&request).await.map(Arc::new) })
            .await?;
        Ok((**outcome).clone())
    }

    async fn perform(&self, request: &DownloadRequest) -> JavelinResult<DownloadOutcome> {
        let key = &request.key;
        let expected = request.expected.as_deref().and_then(normalize_checksum);

        if self.cache.has(key) {
            let bytes = self.cache.read(key).await?;
            let checksum = sha256_digest(&bytes);
            if let Some(expected) = &expected {
                self.verify(key, expected, &checksum)?;
            }
            debug!("Cache hit for {}", key);
            return Ok(DownloadOutcome {
                key: key.clone(),
                path: self.cache.path(key),
                checksum,
                fetched: false,
            });
        }

        let url = join_url(&request.repository, &key.repo_path());
        let expected = match expected {
            Some(e) => Some(e),
            None => self.sidecar_checksum(&url).await,
        };

        let bytes = self.fetch_with_retry(&url, request).await?;
        let checksum = sha256_digest(&bytes);
        if let Some(expected) = &expected {
            self.verify(key, expected, &checksum)?;
        }

        let path = self.cache.put(key, &bytes).await?;
        Ok(DownloadOutcome {
            key: key.clone(),
            path,
            checksum,
            fetched: true,
        })
    }

    fn verify(&self, key: &CacheKey, expected_hex: &str, actual: &str) -> JavelinResult<()> {
        let actual_hex = actual.trim_start_matches("sha256:");
        if actual_hex != expected_hex {
            return Err(JavelinError::Integrity {
                coordinate: key.to_string(),
                expected: format!("sha256:{expected_hex}"),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Checksum published next to the artifact, if the repository has one.
    /// Best-effort: any failure just means trust-on-first-download.
    async fn sidecar_checksum(&self, url: &str) -> Option<String> {
        let sidecar = format!("{url}.sha256");
        match self.fetcher.fetch(&sidecar).await {
            Ok(Some(bytes)) => normalize_checksum(&String::from_utf8_lossy(&bytes)),
            Ok(None) => None,
            Err(e) => {
                debug!("No usable checksum sidecar at {}: {}", sidecar, e);
                None
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        request: &DownloadRequest,
    ) -> JavelinResult<Vec<u8>> {
        let mut last: Option<JavelinError> = None;
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                let backoff = Duration::from_millis(200 * (1 << (attempt - 2).min(4)));
                tokio::time::sleep(backoff).await;
            }
            match self.fetcher.fetch(url).await {
                Ok(Some(bytes)) => return Ok(bytes),
                // permanent miss: never retried
                Ok(None) => {
                    return Err(JavelinError::ArtifactNotFound {
                        coordinate: request.key.to_string(),
                        repositories: request.repository.clone(),
                    })
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt, self.retry_attempts, url, e
                    );
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match last {
            Some(JavelinError::Network { url, reason, .. }) => Err(JavelinError::Network {
                url,
                attempts: self.retry_attempts,
                reason,
            }),
            Some(e) => Err(e),
            None => Err(JavelinError::Internal("retry loop without attempts".to_string())),
        }
    }
}

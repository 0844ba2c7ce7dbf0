//! HTTP fetch layer with rate limiting, retries, and an optional page cache.
//!
//! All outbound requests go through a single [`Fetcher`]:
//!
//! - Requests are sequential; a 2 second politeness delay is enforced per
//!   host, since the mirrored sites throttle aggressive clients.
//! - Each URL is attempted up to 3 times with exponential backoff and
//!   jitter before the failure is reported to the caller.
//! - The user agent is spoofed to look like Firefox; the sites 403 the
//!   default library user agents.
//! - With a cache directory configured, fetched pages are stored on disk
//!   and reused for 12 hours. This makes re-runs of a large batch cheap
//!   while the mirror is being debugged.

use rand::{rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::utils::truncate_for_log;

const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Fedora; Linux x86_64; rv:76.0) Gecko/20100101 Firefox/76.0";

const FETCH_DELAY: Duration = Duration::from_secs(2);
const FETCH_TRIES: usize = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);
const CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Rate-limited, retrying HTTP client for the source sites.
pub struct Fetcher {
    client: reqwest::Client,
    delay: Duration,
    tries: usize,
    cache: Option<PageCache>,
    last_fetch: Mutex<HashMap<String, Instant>>,
}

impl Fetcher {
    /// Build a fetcher, optionally backed by an on-disk page cache.
    pub fn new(cache_dir: Option<PathBuf>) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            delay: FETCH_DELAY,
            tries: FETCH_TRIES,
            cache: cache_dir.map(|dir| PageCache::new(dir, CACHE_TTL)),
            last_fetch: Mutex::new(HashMap::new()),
        })
    }

    #[cfg(test)]
    fn with_policy(delay: Duration, tries: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        Self {
            client,
            delay,
            tries,
            cache: None,
            last_fetch: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch a URL and return its body as text.
    ///
    /// Serves from the page cache when fresh; otherwise waits out the
    /// per-host delay, then retries with backoff until the attempts are
    /// exhausted.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, url: &str) -> Result<String, Box<dyn Error>> {
        if let Some(cache) = &self.cache {
            if let Some(data) = cache.load_fresh(url) {
                debug!(%url, bytes = data.len(), "Serving page from cache");
                return Ok(data);
            }
        }

        let mut attempt = 0usize;
        loop {
            self.wait_for_host(url).await;
            match self.do_fetch(url).await {
                Ok(body) => {
                    if let Some(cache) = &self.cache {
                        if let Err(e) = cache.store(url, &body) {
                            warn!(%url, error = %e, "Failed to write page cache entry");
                        }
                    }
                    return Ok(body);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.tries {
                        warn!(%url, attempt, error = %e, "Fetch exhausted retries");
                        return Err(e);
                    }
                    let mut delay = BACKOFF_BASE.saturating_mul(1 << (attempt - 1));
                    if delay > BACKOFF_MAX {
                        delay = BACKOFF_MAX;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);
                    warn!(%url, attempt, ?delay, error = %e, "Fetch failed; backing off");
                    sleep(delay).await;
                }
            }
        }
    }

    async fn do_fetch(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        info!(%url, bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched page");
        debug!(%url, body = %truncate_for_log(&body, 200), "Response body");
        Ok(body)
    }

    /// Sleep until the per-host politeness delay has passed.
    async fn wait_for_host(&self, url: &str) {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let wait = {
            let last_fetch = self.last_fetch.lock().unwrap();
            match last_fetch.get(&host) {
                Some(last) => self.delay.saturating_sub(last.elapsed()),
                None => Duration::ZERO,
            }
        };
        if !wait.is_zero() {
            debug!(%host, ?wait, "Rate limiting");
            sleep(wait).await;
        }
        self.last_fetch
            .lock()
            .unwrap()
            .insert(host, Instant::now());
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct CachedPage {
    url: String,
    data: String,
}

/// On-disk cache of fetched pages, keyed by the SHA-256 of the URL.
struct PageCache {
    dir: PathBuf,
    ttl: Duration,
}

impl PageCache {
    fn new(dir: PathBuf, ttl: Duration) -> Self {
        Self { dir, ttl }
    }

    fn path_for(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{:x}", digest))
    }

    /// Return the cached body for a URL, if present and within the TTL.
    fn load_fresh(&self, url: &str) -> Option<String> {
        let path = self.path_for(url);
        let modified = std::fs::metadata(&path).ok()?.modified().ok()?;
        if modified.elapsed().ok()? > self.ttl {
            return None;
        }
        let raw = std::fs::read_to_string(&path).ok()?;
        let page: CachedPage = serde_json::from_str(&raw).ok()?;
        Some(page.data)
    }

    fn store(&self, url: &str, data: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let page = CachedPage {
            url: url.to_string(),
            data: data.to_string(),
        };
        let raw = serde_json::to_string(&page).map_err(std::io::Error::other)?;
        std::fs::write(self.path_for(url), raw)
    }
}

//! Cache-aware retrieval of DEM rasters from OpenTopography.
//!
//! [`DemFetcher`] consults the [`TileCache`] first and only reaches the
//! remote [`DemSource`] on a miss. Concurrent requests for the same key are
//! coalesced: one thread performs the fetch while the others wait for it to
//! finish, then read the result from the cache.

use crate::{CacheKey, Dataset, DemError, GeoBoundingBox, Result, TileCache};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default OpenTopography global DEM endpoint.
pub const DEFAULT_BASE_URL: &str = "https://portal.opentopography.org/API/globaldem";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// A request for one DEM raster.
#[derive(Clone)]
pub struct DemRequest {
    dataset: Dataset,
    bbox: GeoBoundingBox,
    api_key: String,
}

impl DemRequest {
    /// Create a request. The API key must be non-blank.
    pub fn new(dataset: Dataset, bbox: GeoBoundingBox, api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(DemError::Validation("API key must not be empty".to_string()));
        }
        Ok(Self {
            dataset,
            bbox,
            api_key,
        })
    }

    /// Elevation product.
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Area to retrieve.
    pub fn bbox(&self) -> &GeoBoundingBox {
        &self.bbox
    }

    /// OpenTopography API key. Never logged.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Cache key identifying the raster this request produces.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::raster(self.dataset, &self.bbox)
    }
}

impl fmt::Debug for DemRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemRequest")
            .field("dataset", &self.dataset)
            .field("bbox", &self.bbox)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Raw answer from a [`DemSource`].
#[derive(Debug, Clone)]
pub struct SourceResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

/// Something that can produce raster bytes for a request.
///
/// Implementations report transport failures as errors and hand every HTTP
/// answer back unchanged; status interpretation is done by [`DemFetcher`].
pub trait DemSource: Send + Sync {
    /// Perform one remote request.
    fn fetch(&self, request: &DemRequest, key: &CacheKey) -> Result<SourceResponse>;
}

/// Settings for the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Endpoint URL.
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FetcherConfig {
    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Blocking HTTP client for the OpenTopography global DEM API.
pub struct OpenTopographyClient {
    client: reqwest::blocking::Client,
    base_url: String,
    timeout: Duration,
}

impl fmt::Debug for OpenTopographyClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenTopographyClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenTopographyClient {
    /// Build a client from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        if config.timeout_secs == 0 {
            return Err(DemError::Validation(
                "fetch timeout must be at least one second".to_string(),
            ));
        }
        let timeout = config.timeout();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout,
        })
    }
}

impl DemSource for OpenTopographyClient {
    fn fetch(&self, request: &DemRequest, key: &CacheKey) -> Result<SourceResponse> {
        let bbox = &request.bbox;
        let query = [
            ("demtype", request.dataset.as_str().to_string()),
            ("south", bbox.south().to_string()),
            ("north", bbox.north().to_string()),
            ("west", bbox.west().to_string()),
            ("east", bbox.east().to_string()),
            ("outputFormat", "GTiff".to_string()),
            ("API_Key", request.api_key.clone()),
        ];

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                DemError::RemoteFetchTimeout {
                    key: key.to_string(),
                    timeout: self.timeout,
                }
            } else {
                // Strip the URL: its query string carries the API key
                DemError::RemoteTransport {
                    key: key.to_string(),
                    source: e.without_url(),
                }
            }
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .map_err(map_err)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(map_err)?.to_vec();

        Ok(SourceResponse { status, body })
    }
}

/// Fetch statistics for this session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Number of successful remote fetches.
    pub fetches: usize,
    /// Total bytes received from successful remote fetches.
    pub bytes_fetched: u64,
}

/// Keys with a remote fetch currently running.
struct InFlight {
    keys: HashSet<String>,
}

/// Cache-first DEM retrieval with per-key fetch coalescing.
pub struct DemFetcher {
    cache: Arc<TileCache>,
    source: Box<dyn DemSource>,
    in_flight: Mutex<InFlight>,
    fetch_complete: Condvar,
    fetches: AtomicUsize,
    bytes_fetched: AtomicU64,
}

impl fmt::Debug for DemFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemFetcher")
            .field("cache_dir", &self.cache.dir())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Releases an in-flight key and wakes waiters, even on early return.
struct InFlightGuard<'a> {
    fetcher: &'a DemFetcher,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.fetcher.in_flight.lock() {
            in_flight.keys.remove(&self.key);
        }
        self.fetcher.fetch_complete.notify_all();
    }
}

impl DemFetcher {
    /// Create a fetcher over a cache and a remote source.
    pub fn new(cache: Arc<TileCache>, source: Box<dyn DemSource>) -> Self {
        Self {
            cache,
            source,
            in_flight: Mutex::new(InFlight {
                keys: HashSet::new(),
            }),
            fetch_complete: Condvar::new(),
            fetches: AtomicUsize::new(0),
            bytes_fetched: AtomicU64::new(0),
        }
    }

    /// Create a fetcher backed by [`OpenTopographyClient`].
    pub fn open_topography(cache: Arc<TileCache>, config: &FetcherConfig) -> Result<Self> {
        Ok(Self::new(cache, Box::new(OpenTopographyClient::new(config)?)))
    }

    /// The underlying cache.
    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Get fetch statistics for this session.
    pub fn stats(&self) -> FetchStats {
        FetchStats {
            fetches: self.fetches.load(Ordering::Relaxed),
            bytes_fetched: self.bytes_fetched.load(Ordering::Relaxed),
        }
    }

    /// Return the raster bytes for a request, from cache when possible.
    ///
    /// This method is thread-safe. If multiple threads request the same key:
    /// - The first thread performs the remote fetch
    /// - Other threads wait, then read the stored entry
    /// - If the first fetch failed, the next waiter retries it
    ///
    /// Failed fetches never write to the cache.
    pub fn fetch(&self, request: &DemRequest) -> Result<Vec<u8>> {
        let key = request.cache_key();

        if let Some(bytes) = self.cache.get(&key)? {
            debug!(key = %key, bytes = bytes.len(), "DEM cache hit");
            return Ok(bytes);
        }

        let _guard = loop {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| DemError::CacheLockPoisoned)?;

            if in_flight.keys.contains(key.as_str()) {
                debug!(key = %key, "waiting for in-flight DEM fetch");
                let _woken = self
                    .fetch_complete
                    .wait(in_flight)
                    .map_err(|_| DemError::CacheLockPoisoned)?;
                continue;
            }

            // The previous holder may have stored it while we waited
            if let Some(bytes) = self.cache.get(&key)? {
                return Ok(bytes);
            }

            in_flight.keys.insert(key.as_str().to_string());
            break InFlightGuard {
                fetcher: self,
                key: key.as_str().to_string(),
            };
        };

        self.fetch_remote(request, &key)
    }

    /// Derive the bounding box for a circle and fetch it.
    pub fn fetch_region(
        &self,
        dataset: Dataset,
        lat: f64,
        lon: f64,
        radius_km: f64,
        api_key: &str,
    ) -> Result<Vec<u8>> {
        let bbox = GeoBoundingBox::around(lat, lon, radius_km)?;
        self.fetch(&DemRequest::new(dataset, bbox, api_key)?)
    }

    fn fetch_remote(&self, request: &DemRequest, key: &CacheKey) -> Result<Vec<u8>> {
        info!(dataset = %request.dataset, bbox = %request.bbox, "fetching DEM from remote source");

        let response = self.source.fetch(request, key).inspect_err(|e| {
            warn!(key = %key, error = %e, "DEM fetch failed");
        })?;

        if !(200..300).contains(&response.status) {
            warn!(key = %key, status = response.status, "DEM provider returned an error status");
            return Err(self.remote_error(request, key, response.status));
        }
        if response.body.is_empty() {
            warn!(key = %key, "DEM provider returned an empty body");
            return Err(self.remote_error(request, key, 0));
        }

        self.fetches.fetch_add(1, Ordering::Relaxed);
        self.bytes_fetched
            .fetch_add(response.body.len() as u64, Ordering::Relaxed);

        self.cache.put(key, &response.body)?;
        info!(key = %key, bytes = response.body.len(), "DEM fetched and cached");

        Ok(response.body)
    }

    fn remote_error(&self, request: &DemRequest, key: &CacheKey, status: u16) -> DemError {
        DemError::RemoteFetch {
            status,
            key: key.to_string(),
            dataset: request.dataset.to_string(),
            bbox: request.bbox,
        }
    }
}

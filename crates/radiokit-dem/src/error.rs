//! Error types for the DEM crate.

use crate::GeoBoundingBox;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when retrieving, caching or sampling DEM data.
#[derive(Debug, Error)]
pub enum DemError {
    /// Malformed input: unsupported dataset, coordinate out of range, missing field.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bounding-box geometry is undefined this close to a pole.
    #[error("Latitude {lat} is too close to a pole to derive a bounding box")]
    InvalidLatitude {
        /// Requested latitude.
        lat: f64,
    },

    /// The elevation provider answered with a non-success status.
    #[error("Remote fetch of {dataset} {bbox} failed with HTTP {status} (key {key})")]
    RemoteFetch {
        /// HTTP status code (0 when the body was empty).
        status: u16,
        /// Cache key of the request.
        key: String,
        /// Dataset identifier.
        dataset: String,
        /// Requested bounding box.
        bbox: GeoBoundingBox,
    },

    /// The elevation provider did not answer within the configured timeout.
    #[error("Remote fetch timed out after {timeout:?} (key {key})")]
    RemoteFetchTimeout {
        /// Cache key of the request.
        key: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Connection-level failure talking to the elevation provider.
    #[error("Remote fetch failed (key {key}): {source}")]
    RemoteTransport {
        /// Cache key of the request.
        key: String,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Raster payload is malformed or lacks georeferencing.
    #[error("Raster decode error: {0}")]
    RasterDecode(String),

    /// TIFF decoding error.
    #[error("TIFF decode error: {0}")]
    TiffDecode(#[from] tiff::TiffError),

    /// I/O error in the tile cache.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache lock was poisoned (a thread panicked while holding the lock).
    #[error("Tile cache lock was poisoned")]
    CacheLockPoisoned,

    /// A cached elevation grid could not be encoded or decoded.
    #[error("Elevation grid encoding error: {0}")]
    GridEncoding(#[from] serde_json::Error),
}

impl DemError {
    /// Whether retrying the same request could succeed.
    ///
    /// Remote failures leave no cache entry behind, so they are safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DemError::RemoteFetch { .. }
                | DemError::RemoteFetchTimeout { .. }
                | DemError::RemoteTransport { .. }
        )
    }
}

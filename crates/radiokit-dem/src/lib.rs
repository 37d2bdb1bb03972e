//! # radiokit-dem
//!
//! Terrain retrieval for radio path analysis: OpenTopography global DEM
//! rasters fetched for a bounding box, kept in a size-bounded on-disk cache,
//! and resampled onto a hexagonal (H3) grid.
//!
//! ## Overview
//!
//! The pipeline runs in four steps:
//!
//! 1. [`GeoBoundingBox::around`] turns a center point and radius into a
//!    latitude/longitude rectangle on a spherical Earth.
//! 2. [`DemFetcher`] returns the GeoTIFF bytes for a [`DemRequest`], reading
//!    the [`TileCache`] first and calling OpenTopography only on a miss.
//! 3. [`Raster`] decodes the GeoTIFF (tiepoint, pixel scale and GDAL no-data
//!    tags).
//! 4. [`GridSampler`] samples the raster on a regular mesh and produces an
//!    [`ElevationGrid`] of hex cell elevations.
//!
//! Supported products are listed in [`Dataset`].
//!
//! ## Example
//!
//! ```no_run
//! use radiokit_dem::{CacheConfig, Dataset, DemFetcher, FetcherConfig, GridSampler, SamplerConfig, TileCache};
//! use std::sync::Arc;
//!
//! let cache = Arc::new(TileCache::open(CacheConfig::default())?);
//! let fetcher = DemFetcher::open_topography(cache, &FetcherConfig::default())?;
//!
//! // 100 km around Calgary
//! let bytes = fetcher.fetch_region(Dataset::Srtmgl3, 51.0447, -114.0719, 100.0, "my-api-key")?;
//!
//! let bbox = radiokit_dem::GeoBoundingBox::around(51.0447, -114.0719, 100.0)?;
//! let grid = GridSampler::new(&SamplerConfig::default())?.sample(&bytes, &bbox, 8)?;
//! println!("{} cells sampled", grid.len());
//! # Ok::<(), radiokit_dem::DemError>(())
//! ```

mod bbox;
mod cache;
mod dataset;
mod error;
mod fetcher;
mod grid;
mod raster;

#[cfg(test)]
mod test_util;

pub use bbox::{GeoBoundingBox, EARTH_RADIUS_KM, MAX_ABS_LATITUDE};
pub use cache::{CacheConfig, CacheKey, CacheStats, TileCache, DEFAULT_CACHE_DIR, DEFAULT_CACHE_SIZE_BYTES};
pub use dataset::Dataset;
pub use error::DemError;
pub use fetcher::{
    DemFetcher, DemRequest, DemSource, FetchStats, FetcherConfig, OpenTopographyClient, SourceResponse,
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS,
};
pub use grid::{parse_resolution, ElevationGrid, GridSampler, SamplerConfig, DEFAULT_MESH_SIZE};
pub use raster::Raster;

/// Re-exported hex grid types used in the public API.
pub use h3o::{CellIndex, LatLng, Resolution};

/// Result type for DEM operations.
pub type Result<T> = std::result::Result<T, DemError>;

//! # radiokit-runner
//!
//! Wiring behind the `radiokit` command: configuration loading, logging
//! setup, and a [`Runner`] that owns the cache, fetcher and terrain pipeline
//! for one invocation.

mod config;
mod error;
mod logging;

pub use config::RunnerConfig;
pub use error::{Result, RunnerError};
pub use logging::init_logging;

use radiokit_dem::{
    CacheStats, DemFetcher, DemRequest, DemSource, GeoBoundingBox, GridSampler, TileCache,
};
use radiokit_itm::{P2pParams, PropagationModel};
use radiokit_link::{LinkPrediction, PathProfile, TerrainPipeline};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Environment variable holding the OpenTopography API key.
pub const API_KEY_ENV: &str = "OPENTOPO_API_KEY";

/// Pick the API key from the command line, falling back to the environment.
///
/// Blank values count as absent.
pub fn resolve_api_key(flag: Option<&str>, env: Option<String>) -> Result<String> {
    flag.map(str::to_string)
        .or(env)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or(RunnerError::MissingApiKey(API_KEY_ENV))
}

/// Parse `"LAT,LON"` in decimal degrees.
pub fn parse_coordinate(s: &str) -> std::result::Result<(f64, f64), String> {
    let (lat, lon) = s
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got '{}'", s))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude '{}'", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude '{}'", lon.trim()))?;
    if !(-90.0..=90.0).contains(&lat) {
        return Err(format!("latitude {} out of range [-90, 90]", lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(format!("longitude {} out of range [-180, 180]", lon));
    }
    Ok((lat, lon))
}

/// Summary printed by `fetch`.
#[derive(Debug, Clone, Serialize)]
pub struct FetchSummary {
    pub dataset: String,
    pub bbox: GeoBoundingBox,
    pub cache_key: String,
    pub bytes: usize,
}

/// Owns the components for one command.
#[derive(Debug)]
pub struct Runner {
    cache: Arc<TileCache>,
    pipeline: TerrainPipeline,
    radio: P2pParams,
}

impl Runner {
    /// Build a runner that fetches from OpenTopography.
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        let cache = Arc::new(TileCache::open(config.cache.clone())?);
        let fetcher = DemFetcher::open_topography(Arc::clone(&cache), &config.fetcher)?;
        Self::with_fetcher(config, cache, fetcher)
    }

    /// Build a runner over another DEM source.
    pub fn with_source(config: &RunnerConfig, source: Box<dyn DemSource>) -> Result<Self> {
        let cache = Arc::new(TileCache::open(config.cache.clone())?);
        let fetcher = DemFetcher::new(Arc::clone(&cache), source);
        Self::with_fetcher(config, cache, fetcher)
    }

    fn with_fetcher(config: &RunnerConfig, cache: Arc<TileCache>, fetcher: DemFetcher) -> Result<Self> {
        let sampler = GridSampler::new(&config.sampler)?;
        let pipeline = TerrainPipeline::new(fetcher, sampler, config.pipeline.clone())?;
        config.radio.validate()?;
        Ok(Self {
            cache,
            pipeline,
            radio: config.radio.clone(),
        })
    }

    /// The terrain pipeline.
    pub fn pipeline(&self) -> &TerrainPipeline {
        &self.pipeline
    }

    /// Link parameters used by [`Runner::predict`].
    pub fn radio(&self) -> &P2pParams {
        &self.radio
    }

    /// Fetch the raster for a circle; returns the summary and the GeoTIFF bytes.
    pub fn fetch(&self, lat: f64, lon: f64, radius_km: f64, api_key: &str) -> Result<(FetchSummary, Vec<u8>)> {
        let dataset = self.pipeline.config().dataset;
        let bbox = GeoBoundingBox::around(lat, lon, radius_km)?;
        let request = DemRequest::new(dataset, bbox, api_key)?;
        let bytes = self.pipeline.fetcher().fetch(&request)?;
        let summary = FetchSummary {
            dataset: dataset.to_string(),
            bbox,
            cache_key: request.cache_key().to_string(),
            bytes: bytes.len(),
        };
        Ok((summary, bytes))
    }

    /// Profile between two points over terrain loaded for a circle.
    ///
    /// `None` when the endpoints are further apart than the pipeline allows.
    pub fn profile(
        &self,
        center: (f64, f64),
        radius_km: f64,
        from: (f64, f64),
        to: (f64, f64),
        api_key: &str,
    ) -> Result<Option<PathProfile>> {
        let terrain = self.pipeline.load_grid(center.0, center.1, radius_km, api_key)?;
        Ok(self.pipeline.profile(&terrain, from, to)?)
    }

    /// Path loss between two points with the radio parameters the runner was
    /// built with.
    pub fn predict<M: PropagationModel + ?Sized>(
        &self,
        model: &M,
        center: (f64, f64),
        radius_km: f64,
        from: (f64, f64),
        to: (f64, f64),
        api_key: &str,
    ) -> Result<Option<LinkPrediction>> {
        let Some(profile) = self.profile(center, radius_km, from, to, api_key)? else {
            return Ok(None);
        };
        let prediction = self.pipeline.predict(model, &self.radio, &profile)?;
        info!(
            distance_m = prediction.distance_m,
            path_loss_db = prediction.path_loss_db,
            "link predicted"
        );
        Ok(Some(prediction))
    }

    /// Flush the cache and report its counters.
    pub fn close(self) -> Result<CacheStats> {
        Ok(self.cache.close()?)
    }
}

/// Terrain radius when none is given: the pipeline's maximum distance, or
/// 1 km when that is zero.
pub fn default_radius_km(config: &RunnerConfig) -> f64 {
    (config.pipeline.max_distance_m / 1000.0).max(1.0)
}

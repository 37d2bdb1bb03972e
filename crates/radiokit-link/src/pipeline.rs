//! Terrain pipeline: bounding box, DEM fetch, hex sampling, path loss.

use crate::profile::{cell_at, MissingElevation, PathProfile, ProfileBuilder};
use crate::{LinkError, Result};
use radiokit_dem::{
    parse_resolution, CacheKey, CellIndex, Dataset, DemError, DemFetcher, DemRequest, ElevationGrid,
    GeoBoundingBox, GridSampler, Resolution,
};
use radiokit_itm::{P2pParams, PropagationModel};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Default hex resolution (cells of roughly 0.74 km²).
pub const DEFAULT_RESOLUTION: u8 = 8;

/// Default maximum path length considered for a link, meters.
pub const DEFAULT_MAX_DISTANCE_M: f64 = 100_000.0;

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Elevation product to fetch.
    pub dataset: Dataset,
    /// Hex resolution of the sampled grid (0-15).
    pub resolution: u8,
    /// Pairs further apart than this are skipped.
    pub max_distance_m: f64,
    /// Gap handling when a profile feeds the propagation model.
    pub missing_elevation: MissingElevation,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: Dataset::default(),
            resolution: DEFAULT_RESOLUTION,
            max_distance_m: DEFAULT_MAX_DISTANCE_M,
            missing_elevation: MissingElevation::default(),
        }
    }
}

/// Sampled terrain for one query region.
#[derive(Debug, Clone)]
pub struct TerrainGrid {
    /// Region the grid was sampled over.
    pub bbox: GeoBoundingBox,
    /// Hex cell elevations.
    pub grid: ElevationGrid,
}

/// Summary of the terrain along a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrainInfo {
    /// Number of samples fed to the model.
    pub sample_count: usize,
    /// Samples that had no elevation in the grid.
    pub missing_count: usize,
    /// Spacing between samples, meters.
    pub spacing_m: f64,
    /// Lowest elevation, meters.
    pub min_elevation: f64,
    /// Highest elevation, meters.
    pub max_elevation: f64,
    /// Mean elevation, meters.
    pub mean_elevation: f64,
    /// Terrain irregularity (max - min), meters.
    pub delta_h: f64,
}

/// Path loss predicted for one profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPrediction {
    /// Great-circle distance between endpoint cells, meters.
    pub distance_m: f64,
    /// Terrain statistics.
    pub terrain: TerrainInfo,
    /// Median basic transmission loss, dB.
    pub path_loss_db: f64,
    /// Model return code.
    pub status_code: i32,
    /// Model warnings.
    pub warnings: Vec<String>,
}

/// End-to-end terrain retrieval and prediction.
///
/// Elevation grids are cached next to the rasters they come from, keyed by
/// dataset, bounding box, resolution and sampling mesh, so a repeated query
/// neither fetches nor resamples.
#[derive(Debug)]
pub struct TerrainPipeline {
    fetcher: DemFetcher,
    sampler: GridSampler,
    config: PipelineConfig,
    resolution: Resolution,
}

impl TerrainPipeline {
    /// Create a pipeline. Fails if the configured resolution or distance is invalid.
    pub fn new(fetcher: DemFetcher, sampler: GridSampler, config: PipelineConfig) -> Result<Self> {
        let resolution = parse_resolution(config.resolution)?;
        if !(config.max_distance_m >= 0.0) {
            return Err(LinkError::Validation(format!(
                "max distance {} must be zero or positive",
                config.max_distance_m
            )));
        }
        Ok(Self {
            fetcher,
            sampler,
            config,
            resolution,
        })
    }

    /// Pipeline settings.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The DEM fetcher.
    pub fn fetcher(&self) -> &DemFetcher {
        &self.fetcher
    }

    /// Hex cell of a coordinate at the pipeline's resolution.
    pub fn cell_at(&self, lat: f64, lon: f64) -> Result<CellIndex> {
        cell_at(lat, lon, self.resolution)
    }

    /// Elevation grid for the circle of `radius_km` around a point.
    ///
    /// A raster that fails to decode is removed from the cache so the next
    /// call fetches it again.
    pub fn load_grid(&self, lat: f64, lon: f64, radius_km: f64, api_key: &str) -> Result<TerrainGrid> {
        let bbox = GeoBoundingBox::around(lat, lon, radius_km)?;
        let cache = self.fetcher.cache();
        let grid_key = CacheKey::grid(
            self.config.dataset,
            &bbox,
            self.config.resolution,
            self.sampler.mesh_size(),
        );

        if let Some(bytes) = cache.get(&grid_key)? {
            match ElevationGrid::from_bytes(&bytes) {
                Ok(grid) => {
                    debug!(key = %grid_key, cells = grid.len(), "elevation grid cache hit");
                    return Ok(TerrainGrid { bbox, grid });
                }
                Err(e) => {
                    warn!(key = %grid_key, error = %e, "discarding unreadable cached grid");
                    cache.remove(&grid_key)?;
                }
            }
        }

        let request = DemRequest::new(self.config.dataset, bbox, api_key)?;
        let raster = self.fetcher.fetch(&request)?;

        let grid = match self.sampler.sample(&raster, &bbox, self.config.resolution) {
            Ok(grid) => grid,
            Err(e @ (DemError::RasterDecode(_) | DemError::TiffDecode(_))) => {
                warn!(key = %request.cache_key(), error = %e, "removing undecodable raster from cache");
                cache.remove(&request.cache_key())?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        cache.put(&grid_key, &grid.to_bytes()?)?;
        info!(
            dataset = %self.config.dataset,
            bbox = %bbox,
            resolution = self.config.resolution,
            cells = grid.len(),
            "elevation grid sampled"
        );

        Ok(TerrainGrid { bbox, grid })
    }

    /// Profile between two coordinates, or `None` beyond the max distance.
    pub fn profile(
        &self,
        terrain: &TerrainGrid,
        from: (f64, f64),
        to: (f64, f64),
    ) -> Result<Option<PathProfile>> {
        let origin = self.cell_at(from.0, from.1)?;
        let target = self.cell_at(to.0, to.1)?;
        ProfileBuilder::build_profile(&terrain.grid, origin, target, self.config.max_distance_m)
    }

    /// Predict path loss along a profile.
    pub fn predict<M: PropagationModel + ?Sized>(
        &self,
        model: &M,
        params: &P2pParams,
        profile: &PathProfile,
    ) -> Result<LinkPrediction> {
        predict_profile(model, params, profile, self.config.missing_elevation)
    }

    /// Predict path loss from one origin cell to each target within range.
    pub fn predict_links<M: PropagationModel + ?Sized>(
        &self,
        model: &M,
        params: &P2pParams,
        terrain: &TerrainGrid,
        origin: CellIndex,
        targets: &[CellIndex],
    ) -> Result<Vec<(CellIndex, LinkPrediction)>> {
        ProfileBuilder::build_profiles(&terrain.grid, origin, targets, self.config.max_distance_m)?
            .into_iter()
            .map(|(target, profile)| Ok((target, self.predict(model, params, &profile)?)))
            .collect()
    }
}

/// Run a propagation model over a profile with the given gap policy.
pub fn predict_profile<M: PropagationModel + ?Sized>(
    model: &M,
    params: &P2pParams,
    profile: &PathProfile,
    missing: MissingElevation,
) -> Result<LinkPrediction> {
    params.validate()?;
    let elevations = profile.elevations(missing)?;
    let pfl = profile.to_pfl(missing)?;

    // to_pfl guarantees at least two samples
    let min_elevation = elevations.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_elevation = elevations.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean_elevation = elevations.iter().sum::<f64>() / elevations.len() as f64;

    let result = model.p2p_tls(params, &pfl)?;
    if !result.warnings.is_empty() {
        debug!(warnings = ?result.warnings, "propagation model warnings");
    }

    Ok(LinkPrediction {
        distance_m: profile.distance_m(),
        terrain: TerrainInfo {
            sample_count: elevations.len(),
            missing_count: profile.missing_count(),
            spacing_m: profile.spacing_m(),
            min_elevation,
            max_elevation,
            mean_elevation,
            delta_h: max_elevation - min_elevation,
        },
        path_loss_db: result.loss_db,
        status_code: result.status_code,
        warnings: result.warnings,
    })
}

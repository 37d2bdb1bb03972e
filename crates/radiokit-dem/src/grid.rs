//! Hexagonal elevation grids sampled from rasters.

use crate::{DemError, GeoBoundingBox, Raster, Result};
use h3o::{CellIndex, LatLng, Resolution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Default number of mesh points along each axis.
pub const DEFAULT_MESH_SIZE: usize = 101;

/// Elevation in meters for each hex cell, all at one resolution.
///
/// Raster values are rounded to the nearest meter, not truncated, so
/// `1234.6` is stored as `1235` and `-0.4` as `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    resolution: Resolution,
    cells: HashMap<CellIndex, i32>,
}

/// On-disk form: cells sorted by index so equal grids encode identically.
#[derive(Serialize, Deserialize)]
struct GridRecord {
    resolution: u8,
    cells: Vec<(u64, i32)>,
}

impl ElevationGrid {
    /// Create an empty grid.
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            cells: HashMap::new(),
        }
    }

    /// Hex resolution of every cell in the grid.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Elevation of a cell, if sampled.
    pub fn get(&self, cell: CellIndex) -> Option<i32> {
        self.cells.get(&cell).copied()
    }

    /// Insert or replace a cell's elevation.
    ///
    /// Fails if the cell is at a different resolution than the grid.
    pub fn insert(&mut self, cell: CellIndex, elevation: i32) -> Result<()> {
        if cell.resolution() != self.resolution {
            return Err(DemError::Validation(format!(
                "cell {} has resolution {}, grid has {}",
                cell,
                u8::from(cell.resolution()),
                u8::from(self.resolution)
            )));
        }
        self.cells.insert(cell, elevation);
        Ok(())
    }

    /// Whether a cell was sampled.
    pub fn contains(&self, cell: CellIndex) -> bool {
        self.cells.contains_key(&cell)
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over `(cell, elevation)` pairs in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (CellIndex, i32)> + '_ {
        self.cells.iter().map(|(cell, elevation)| (*cell, *elevation))
    }

    /// Encode for the tile cache.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut cells: Vec<(u64, i32)> = self.iter().map(|(c, e)| (u64::from(c), e)).collect();
        cells.sort_unstable_by_key(|(cell, _)| *cell);
        let record = GridRecord {
            resolution: u8::from(self.resolution),
            cells,
        };
        Ok(serde_json::to_vec(&record)?)
    }

    /// Decode a grid written by [`ElevationGrid::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: GridRecord = serde_json::from_slice(bytes)?;
        let resolution = parse_resolution(record.resolution)?;

        let mut grid = Self::new(resolution);
        for (raw, elevation) in record.cells {
            let cell = CellIndex::try_from(raw)
                .map_err(|e| DemError::Validation(format!("invalid cell index {:#x}: {}", raw, e)))?;
            grid.insert(cell, elevation)?;
        }
        Ok(grid)
    }
}

/// Convert a numeric hex resolution, rejecting values above 15.
pub fn parse_resolution(resolution: u8) -> Result<Resolution> {
    Resolution::try_from(resolution).map_err(|_| {
        DemError::Validation(format!(
            "hex resolution {} is outside 0..=15",
            resolution
        ))
    })
}

/// Sampler settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Mesh points along each axis of the bounding box.
    pub mesh_size: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mesh_size: DEFAULT_MESH_SIZE,
        }
    }
}

/// Converts a raster into an [`ElevationGrid`] by sampling a regular mesh.
///
/// The mesh is `mesh_size × mesh_size` points spaced evenly over the bounding
/// box, edges included. Each point is mapped to its hex cell and looked up in
/// the raster; points off the raster or on no-data pixels are dropped. When
/// several points land in one cell, the one nearest the cell centre wins, and
/// exact ties keep the earlier point (south to north, then west to east).
///
/// A mesh coarser than the hex resolution leaves cells unsampled.
#[derive(Debug, Clone)]
pub struct GridSampler {
    mesh_size: usize,
}

impl GridSampler {
    /// Create a sampler. The mesh needs at least two points per axis.
    pub fn new(config: &SamplerConfig) -> Result<Self> {
        if config.mesh_size < 2 {
            return Err(DemError::Validation(format!(
                "mesh size {} must be at least 2",
                config.mesh_size
            )));
        }
        Ok(Self {
            mesh_size: config.mesh_size,
        })
    }

    /// Mesh points along each axis.
    pub fn mesh_size(&self) -> usize {
        self.mesh_size
    }

    /// Decode raster bytes and sample them at `resolution`.
    pub fn sample(&self, raster_bytes: &[u8], bbox: &GeoBoundingBox, resolution: u8) -> Result<ElevationGrid> {
        let resolution = parse_resolution(resolution)?;
        let raster = Raster::from_bytes(raster_bytes)?;
        self.sample_raster(&raster, bbox, resolution)
    }

    /// Sample an already decoded raster.
    pub fn sample_raster(
        &self,
        raster: &Raster,
        bbox: &GeoBoundingBox,
        resolution: Resolution,
    ) -> Result<ElevationGrid> {
        let lats = linspace(bbox.south(), bbox.north(), self.mesh_size);
        let lons = linspace(bbox.west(), bbox.east(), self.mesh_size);

        // cell -> (distance to centre, elevation)
        let mut best: HashMap<CellIndex, (f64, i32)> = HashMap::new();
        let mut dropped = 0usize;

        for &lat in &lats {
            for &lon in &lons {
                let (row, col) = raster.index(lon, lat);
                let Some(elevation) = raster.elevation(row, col) else {
                    dropped += 1;
                    continue;
                };

                let point = LatLng::new(lat, lon)
                    .map_err(|e| DemError::Validation(format!("mesh point ({}, {}): {}", lat, lon, e)))?;
                let cell = point.to_cell(resolution);
                let distance = LatLng::from(cell).distance_m(point);
                let elevation = elevation.round() as i32;

                best.entry(cell)
                    .and_modify(|current| {
                        if distance < current.0 {
                            *current = (distance, elevation);
                        }
                    })
                    .or_insert((distance, elevation));
            }
        }

        debug!(
            mesh_points = self.mesh_size * self.mesh_size,
            cells = best.len(),
            dropped,
            resolution = u8::from(resolution),
            "sampled elevation grid"
        );

        Ok(ElevationGrid {
            resolution,
            cells: best.into_iter().map(|(cell, (_, elevation))| (cell, elevation)).collect(),
        })
    }
}

/// `count` evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    let step = (end - start) / (count - 1) as f64;
    (0..count)
        .map(|i| if i + 1 == count { end } else { start + step * i as f64 })
        .collect()
}

//! Terrain profiles along hex grid paths.

use crate::{LinkError, Result};
use radiokit_dem::{CellIndex, ElevationGrid, LatLng, Resolution};
use radiokit_itm::TerrainProfile;
use serde::{Deserialize, Serialize, Serializer};
use tracing::debug;

/// How gaps in a profile are handled when elevations are required.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum MissingElevation {
    /// Fail with [`LinkError::MissingElevation`] at the first gap.
    #[default]
    Reject,
    /// Substitute a fixed elevation in meters.
    Fill(f64),
}

/// Elevation samples along the grid path between two cells.
#[derive(Debug, Clone, PartialEq)]
pub struct PathProfile {
    cells: Vec<CellIndex>,
    samples: Vec<Option<i32>>,
    distance_m: f64,
}

impl PathProfile {
    /// Cells along the path, origin first.
    pub fn cells(&self) -> &[CellIndex] {
        &self.cells
    }

    /// Elevation per cell, `None` where the grid has no sample.
    pub fn samples(&self) -> &[Option<i32>] {
        &self.samples
    }

    /// Great-circle distance between the endpoint cell centres.
    pub fn distance_m(&self) -> f64 {
        self.distance_m
    }

    /// Distance between consecutive samples; zero for a single-cell path.
    pub fn spacing_m(&self) -> f64 {
        if self.samples.len() < 2 {
            0.0
        } else {
            self.distance_m / (self.samples.len() - 1) as f64
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the profile has no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples without an elevation.
    pub fn missing_count(&self) -> usize {
        self.samples.iter().filter(|s| s.is_none()).count()
    }

    /// Elevations in meters with gaps resolved by `policy`.
    pub fn elevations(&self, policy: MissingElevation) -> Result<Vec<f64>> {
        self.samples
            .iter()
            .enumerate()
            .map(|(index, sample)| match (sample, policy) {
                (Some(elevation), _) => Ok(*elevation as f64),
                (None, MissingElevation::Fill(value)) => Ok(value),
                (None, MissingElevation::Reject) => Err(LinkError::MissingElevation { index }),
            })
            .collect()
    }

    /// ITM terrain profile: `[samples - 1, spacing_m, elevations...]`.
    ///
    /// Needs at least two samples.
    pub fn to_pfl(&self, policy: MissingElevation) -> Result<Vec<f64>> {
        let elevations = self.elevations(policy)?;
        let terrain = TerrainProfile::from_path(self.distance_m, &elevations)?;
        Ok(terrain.to_pfl()?)
    }
}

#[derive(Serialize)]
struct ProfileView<'a> {
    cells: Vec<String>,
    samples: &'a [Option<i32>],
    distance_m: f64,
    spacing_m: f64,
}

impl Serialize for PathProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        ProfileView {
            cells: self.cells.iter().map(|c| c.to_string()).collect(),
            samples: &self.samples,
            distance_m: self.distance_m,
            spacing_m: self.spacing_m(),
        }
        .serialize(serializer)
    }
}

/// Hex cell containing a coordinate.
pub fn cell_at(lat: f64, lon: f64, resolution: Resolution) -> Result<CellIndex> {
    let point = LatLng::new(lat, lon)
        .map_err(|e| LinkError::Validation(format!("invalid coordinate ({}, {}): {}", lat, lon, e)))?;
    Ok(point.to_cell(resolution))
}

/// Great-circle distance between two cell centres in meters.
pub fn cell_distance_m(a: CellIndex, b: CellIndex) -> f64 {
    LatLng::from(a).distance_m(LatLng::from(b))
}

/// Builds [`PathProfile`]s from an [`ElevationGrid`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileBuilder;

impl ProfileBuilder {
    /// Profile between two cells, or `None` if they are further apart than
    /// `max_distance_m`.
    ///
    /// Both cells must be at the grid's resolution. Path cells missing from
    /// the grid yield `None` samples.
    pub fn build_profile(
        grid: &ElevationGrid,
        origin: CellIndex,
        target: CellIndex,
        max_distance_m: f64,
    ) -> Result<Option<PathProfile>> {
        if !(max_distance_m >= 0.0) {
            return Err(LinkError::Validation(format!(
                "max distance {} must be zero or positive",
                max_distance_m
            )));
        }
        for (name, cell) in [("origin", origin), ("target", target)] {
            if cell.resolution() != grid.resolution() {
                return Err(LinkError::Validation(format!(
                    "{} cell {} has resolution {}, grid has {}",
                    name,
                    cell,
                    u8::from(cell.resolution()),
                    u8::from(grid.resolution())
                )));
            }
        }

        let distance_m = cell_distance_m(origin, target);
        if distance_m > max_distance_m {
            debug!(
                origin = %origin,
                target = %target,
                distance_m,
                max_distance_m,
                "pair beyond max distance, skipped"
            );
            return Ok(None);
        }

        let cells = origin
            .grid_path_cells(target)
            .map_err(|e| LinkError::GridPath(format!("{} -> {}: {}", origin, target, e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LinkError::GridPath(format!("{} -> {}: {}", origin, target, e)))?;

        let samples = cells.iter().map(|cell| grid.get(*cell)).collect();

        Ok(Some(PathProfile {
            cells,
            samples,
            distance_m,
        }))
    }

    /// Profiles from one origin to many targets, keeping only pairs within
    /// `max_distance_m`. Results are in target order.
    pub fn build_profiles(
        grid: &ElevationGrid,
        origin: CellIndex,
        targets: &[CellIndex],
        max_distance_m: f64,
    ) -> Result<Vec<(CellIndex, PathProfile)>> {
        let mut profiles = Vec::with_capacity(targets.len());
        for &target in targets {
            if let Some(profile) = Self::build_profile(grid, origin, target, max_distance_m)? {
                profiles.push((target, profile));
            }
        }
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use radiokit_itm::ItmError;

    const CALGARY: (f64, f64) = (51.0447, -114.0719);

    fn res() -> Resolution {
        Resolution::Seven
    }

    /// Grid with every cell on the path from origin to target, elevation = position * 10.
    fn grid_along(origin: CellIndex, target: CellIndex) -> ElevationGrid {
        let mut grid = ElevationGrid::new(res());
        let path: Vec<_> = origin.grid_path_cells(target).unwrap().map(|c| c.unwrap()).collect();
        for (i, cell) in path.iter().enumerate() {
            grid.insert(*cell, 1000 + i as i32 * 10).unwrap();
        }
        grid
    }

    fn origin() -> CellIndex {
        cell_at(CALGARY.0, CALGARY.1, res()).unwrap()
    }

    fn target_east() -> CellIndex {
        // About 14 km east
        cell_at(CALGARY.0, CALGARY.1 + 0.2, res()).unwrap()
    }

    #[test]
    fn test_samples_follow_path() {
        let grid = grid_along(origin(), target_east());
        let profile = ProfileBuilder::build_profile(&grid, origin(), target_east(), 50_000.0)
            .unwrap()
            .unwrap();

        assert_eq!(profile.cells().first(), Some(&origin()));
        assert_eq!(profile.cells().last(), Some(&target_east()));
        assert_eq!(profile.samples().len(), profile.cells().len());
        for (i, sample) in profile.samples().iter().enumerate() {
            assert_eq!(*sample, Some(1000 + i as i32 * 10));
        }
        assert_eq!(profile.samples()[0], grid.get(origin()));
        assert_eq!(*profile.samples().last().unwrap(), grid.get(target_east()));
        assert_relative_eq!(profile.distance_m(), cell_distance_m(origin(), target_east()));
        assert!(profile.distance_m() > 10_000.0 && profile.distance_m() < 18_000.0);
    }

    #[test]
    fn test_missing_cells_are_none() {
        let mut grid = ElevationGrid::new(res());
        grid.insert(origin(), 1045).unwrap();

        let profile = ProfileBuilder::build_profile(&grid, origin(), target_east(), 50_000.0)
            .unwrap()
            .unwrap();

        assert_eq!(profile.samples()[0], Some(1045));
        assert_eq!(profile.missing_count(), profile.len() - 1);
        assert!(matches!(
            profile.elevations(MissingElevation::Reject),
            Err(LinkError::MissingElevation { index: 1 })
        ));
        let filled = profile.elevations(MissingElevation::Fill(0.0)).unwrap();
        assert_eq!(filled[0], 1045.0);
        assert!(filled[1..].iter().all(|e| *e == 0.0));
    }

    #[test]
    fn test_beyond_max_distance_excluded() {
        let grid = ElevationGrid::new(res());
        // About 150 km north
        let far = cell_at(CALGARY.0 + 1.349, CALGARY.1, res()).unwrap();
        assert!((cell_distance_m(origin(), far) - 150_000.0).abs() < 3_000.0);

        assert!(ProfileBuilder::build_profile(&grid, origin(), far, 100_000.0)
            .unwrap()
            .is_none());
        assert!(ProfileBuilder::build_profile(&grid, origin(), far, 200_000.0)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_build_profiles_keeps_retained_pairs_in_order() {
        let grid = grid_along(origin(), target_east());
        let far = cell_at(CALGARY.0 + 1.349, CALGARY.1, res()).unwrap();
        let west = cell_at(CALGARY.0, CALGARY.1 - 0.2, res()).unwrap();

        let profiles =
            ProfileBuilder::build_profiles(&grid, origin(), &[target_east(), far, west], 100_000.0).unwrap();

        let targets: Vec<_> = profiles.iter().map(|(t, _)| *t).collect();
        assert_eq!(targets, vec![target_east(), west]);
    }

    #[test]
    fn test_zero_max_distance_and_single_cell() {
        let mut grid = ElevationGrid::new(res());
        grid.insert(origin(), 1100).unwrap();

        let profile = ProfileBuilder::build_profile(&grid, origin(), origin(), 0.0)
            .unwrap()
            .unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.spacing_m(), 0.0);
        assert_eq!(profile.samples(), &[Some(1100)]);

        // Valid as a profile, but ITM needs two samples
        assert!(matches!(
            profile.to_pfl(MissingElevation::Reject),
            Err(LinkError::Itm(ItmError::InvalidTerrainProfile(_)))
        ));

        assert!(ProfileBuilder::build_profile(&grid, origin(), target_east(), 0.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_pfl_layout() {
        let grid = grid_along(origin(), target_east());
        let profile = ProfileBuilder::build_profile(&grid, origin(), target_east(), 50_000.0)
            .unwrap()
            .unwrap();
        let pfl = profile.to_pfl(MissingElevation::Reject).unwrap();

        assert_eq!(pfl.len(), profile.len() + 2);
        assert_eq!(pfl[0], (profile.len() - 1) as f64);
        assert_relative_eq!(pfl[1], profile.spacing_m());
        assert_eq!(pfl[2], 1000.0);
    }

    #[test]
    fn test_resolution_mismatch_rejected() {
        let grid = ElevationGrid::new(res());
        let coarse = cell_at(CALGARY.0, CALGARY.1, Resolution::Six).unwrap();

        assert!(matches!(
            ProfileBuilder::build_profile(&grid, coarse, origin(), 50_000.0),
            Err(LinkError::Validation(_))
        ));
        assert!(matches!(
            ProfileBuilder::build_profile(&grid, origin(), origin(), -1.0),
            Err(LinkError::Validation(_))
        ));
    }

    #[test]
    fn test_serialize_profile() {
        let mut grid = ElevationGrid::new(res());
        grid.insert(origin(), 1100).unwrap();
        let profile = ProfileBuilder::build_profile(&grid, origin(), target_east(), 50_000.0)
            .unwrap()
            .unwrap();

        let json: serde_json::Value = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["cells"][0], origin().to_string());
        assert_eq!(json["samples"][0], 1100);
        assert!(json["samples"][1].is_null());
        assert!(json["spacing_m"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn test_missing_policy_from_yaml() {
        let reject: MissingElevation = serde_yaml::from_str("policy: reject").unwrap();
        assert_eq!(reject, MissingElevation::Reject);
        let fill: MissingElevation = serde_yaml::from_str("policy: fill\nvalue: 0.0").unwrap();
        assert_eq!(fill, MissingElevation::Fill(0.0));
    }
}

//! Geographic bounding boxes derived from a center point and radius.

use crate::{DemError, Result};
use serde::Serialize;
use std::fmt;

/// Mean Earth radius used for the spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Latitudes at or beyond this magnitude are rejected: the meridian
/// convergence correction `1 / cos(lat)` diverges near the poles.
pub const MAX_ABS_LATITUDE: f64 = 89.0;

/// A WGS 84 latitude/longitude rectangle.
///
/// Every edge lies in the open interval (-180, 180), `south < north` and
/// `west < east`. Boxes crossing the antimeridian are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBoundingBox {
    south: f64,
    north: f64,
    west: f64,
    east: f64,
}

impl GeoBoundingBox {
    /// Create a bounding box from explicit edges.
    pub fn new(south: f64, north: f64, west: f64, east: f64) -> Result<Self> {
        for (name, value) in [("south", south), ("north", north), ("west", west), ("east", east)] {
            if !value.is_finite() || value <= -180.0 || value >= 180.0 {
                return Err(DemError::Validation(format!(
                    "bounding box {} coordinate {} is outside (-180, 180)",
                    name, value
                )));
            }
        }
        if south >= north {
            return Err(DemError::Validation(format!(
                "bounding box south {} must be below north {}",
                south, north
            )));
        }
        if west >= east {
            return Err(DemError::Validation(format!(
                "bounding box west {} must be below east {}",
                west, east
            )));
        }

        Ok(Self {
            south,
            north,
            west,
            east,
        })
    }

    /// Compute the box enclosing a circle of `radius_km` around a point.
    ///
    /// The radius is converted to an angular distance on a sphere of
    /// [`EARTH_RADIUS_KM`]. Latitude bounds are `lat ± d`; longitude bounds are
    /// widened by `asin(sin(d) / cos(lat))` to account for meridian convergence.
    ///
    /// # Errors
    /// * [`DemError::Validation`] for out-of-range inputs or a box whose
    ///   longitudes would leave (-180, 180).
    /// * [`DemError::InvalidLatitude`] when the point is too close to a pole for
    ///   the longitude correction to be defined.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Result<Self> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(DemError::Validation(format!(
                "latitude {} is outside [-90, 90]",
                lat
            )));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(DemError::Validation(format!(
                "longitude {} is outside [-180, 180]",
                lon
            )));
        }
        if !radius_km.is_finite() || radius_km <= 0.0 {
            return Err(DemError::Validation(format!(
                "radius {} must be a positive distance",
                radius_km
            )));
        }
        if lat.abs() >= MAX_ABS_LATITUDE {
            return Err(DemError::InvalidLatitude { lat });
        }

        let lat_rad = lat.to_radians();
        let angular_distance = radius_km / EARTH_RADIUS_KM;

        let south = (lat_rad - angular_distance).to_degrees();
        let north = (lat_rad + angular_distance).to_degrees();
        if south <= -90.0 || north >= 90.0 {
            return Err(DemError::InvalidLatitude { lat });
        }

        // asin is undefined past 1: the circle reaches over the pole
        let ratio = angular_distance.sin() / lat_rad.cos();
        if !ratio.is_finite() || ratio >= 1.0 {
            return Err(DemError::InvalidLatitude { lat });
        }
        let delta_lon = ratio.asin().to_degrees();

        Self::new(south, north, lon - delta_lon, lon + delta_lon)
    }

    /// South edge in degrees.
    pub fn south(&self) -> f64 {
        self.south
    }

    /// North edge in degrees.
    pub fn north(&self) -> f64 {
        self.north
    }

    /// West edge in degrees.
    pub fn west(&self) -> f64 {
        self.west
    }

    /// East edge in degrees.
    pub fn east(&self) -> f64 {
        self.east
    }

    /// Check if a coordinate is within the box (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Midpoint of the box as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }
}

impl fmt::Display for GeoBoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[S {:.5}, N {:.5}, W {:.5}, E {:.5}]",
            self.south, self.north, self.west, self.east
        )
    }
}

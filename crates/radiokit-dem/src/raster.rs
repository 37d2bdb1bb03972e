//! In-memory GeoTIFF elevation raster.

use crate::{DemError, Result};
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// Single-band elevation raster decoded from GeoTIFF bytes.
///
/// The geotransform comes from the ModelTiepoint and ModelPixelScale tags.
/// Pixels are treated as areas: pixel `(row, col)` covers the cell whose
/// north-west corner is `origin + (col * scale_x, -row * scale_y)`.
#[derive(Debug)]
pub struct Raster {
    /// Elevation data in row-major order (north to south, west to east).
    data: Vec<f32>,
    width: u32,
    height: u32,
    /// Longitude of the west edge of column 0.
    origin_lon: f64,
    /// Latitude of the north edge of row 0.
    origin_lat: f64,
    /// Degrees per pixel, west to east.
    scale_x: f64,
    /// Degrees per pixel, north to south.
    scale_y: f64,
    no_data_value: Option<f32>,
}

impl Raster {
    /// Decode a GeoTIFF payload.
    ///
    /// Fails with [`DemError::RasterDecode`] or [`DemError::TiffDecode`] when the
    /// payload is truncated, not a TIFF, or carries no georeferencing.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(DemError::RasterDecode("empty raster payload".to_string()));
        }

        let mut decoder = Decoder::new(Cursor::new(bytes))?;

        // Regional requests can span a few degrees at 30m resolution
        let mut limits = Limits::default();
        limits.decoding_buffer_size = 1024 * 1024 * 1024;
        limits.intermediate_buffer_size = 1024 * 1024 * 1024;
        limits.ifd_value_size = 1024 * 1024 * 1024;
        decoder = decoder.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        if width == 0 || height == 0 {
            return Err(DemError::RasterDecode(format!(
                "raster has degenerate dimensions {}x{}",
                width, height
            )));
        }

        let (origin_lon, origin_lat, scale_x, scale_y) = Self::read_geotransform(&mut decoder)?;
        let no_data_value = Self::read_nodata_value(&mut decoder);
        let data = Self::decode_elevation_data(&mut decoder)?;

        // Interleaved bands would be misread as band 1
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DemError::RasterDecode(format!(
                "raster holds {} samples, expected {} for a single band of {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            origin_lon,
            origin_lat,
            scale_x,
            scale_y,
            no_data_value,
        })
    }

    /// Read the tiepoint origin and pixel scale.
    fn read_geotransform<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<(f64, f64, f64, f64)> {
        let tiepoint = decoder
            .get_tag_f64_vec(Tag::ModelTiepointTag)
            .map_err(|_| DemError::RasterDecode("missing ModelTiepoint tag".to_string()))?;
        let scale = decoder
            .get_tag_f64_vec(Tag::ModelPixelScaleTag)
            .map_err(|_| DemError::RasterDecode("missing ModelPixelScale tag".to_string()))?;

        if tiepoint.len() < 6 || scale.len() < 2 {
            return Err(DemError::RasterDecode(format!(
                "malformed geotransform (tiepoint len {}, scale len {})",
                tiepoint.len(),
                scale.len()
            )));
        }

        // Tiepoint format: [i, j, k, x, y, z] maps pixel (i, j) to (x, y)
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (scale_x, scale_y) = (scale[0], scale[1]);
        if !(scale_x > 0.0 && scale_y > 0.0) {
            return Err(DemError::RasterDecode(format!(
                "non-positive pixel scale ({}, {})",
                scale_x, scale_y
            )));
        }
        let origin_lon = tiepoint[3] - i * scale_x;
        let origin_lat = tiepoint[4] + j * scale_y;

        Ok((origin_lon, origin_lat, scale_x, scale_y))
    }

    /// Read the single band as `f32`, whatever the stored sample type.
    fn decode_elevation_data<R: std::io::Read + std::io::Seek>(
        decoder: &mut Decoder<R>,
    ) -> Result<Vec<f32>> {
        macro_rules! as_f32 {
            ($samples:expr) => {
                $samples.into_iter().map(|v| v as f32).collect()
            };
        }

        let samples = match decoder.read_image()? {
            DecodingResult::F32(samples) => samples,
            DecodingResult::F64(samples) => as_f32!(samples),
            DecodingResult::U8(samples) => as_f32!(samples),
            DecodingResult::U16(samples) => as_f32!(samples),
            DecodingResult::U32(samples) => as_f32!(samples),
            DecodingResult::U64(samples) => as_f32!(samples),
            DecodingResult::I8(samples) => as_f32!(samples),
            DecodingResult::I16(samples) => as_f32!(samples),
            DecodingResult::I32(samples) => as_f32!(samples),
            DecodingResult::I64(samples) => as_f32!(samples),
        };
        Ok(samples)
    }

    /// GDAL_NODATA is stored as ASCII, sometimes NUL-terminated.
    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::GdalNodata)
            .ok()
            .and_then(|s| s.trim_end_matches('\0').trim().parse().ok())
    }

    /// Map a coordinate to a `(row, col)` pixel index.
    ///
    /// The index may fall outside the raster; check it with
    /// [`Raster::in_bounds`] or use [`Raster::elevation`], which does.
    pub fn index(&self, lon: f64, lat: f64) -> (i64, i64) {
        let row = ((self.origin_lat - lat) / self.scale_y).floor() as i64;
        let col = ((lon - self.origin_lon) / self.scale_x).floor() as i64;
        (row, col)
    }

    /// Whether a pixel index lies inside the raster.
    pub fn in_bounds(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && row < self.height as i64 && col < self.width as i64
    }

    /// Elevation at a pixel, or `None` when out of bounds or no-data.
    pub fn elevation(&self, row: i64, col: i64) -> Option<f32> {
        if !self.in_bounds(row, col) {
            return None;
        }
        let value = self.data[row as usize * self.width as usize + col as usize];

        if let Some(nodata) = self.no_data_value {
            if (value - nodata).abs() < 0.001 {
                return None;
            }
        }
        if !value.is_finite() {
            return None;
        }

        Some(value)
    }

    /// Elevation at a coordinate using nearest-pixel lookup.
    pub fn elevation_at(&self, lat: f64, lon: f64) -> Option<f32> {
        let (row, col) = self.index(lon, lat);
        self.elevation(row, col)
    }

    /// Raster width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Raster height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Resolution in degrees per pixel as `(lon, lat)`.
    pub fn resolution(&self) -> (f64, f64) {
        (self.scale_x, self.scale_y)
    }

    /// Geographic extent as `(south, north, west, east)`.
    pub fn extent(&self) -> (f64, f64, f64, f64) {
        (
            self.origin_lat - self.height as f64 * self.scale_y,
            self.origin_lat,
            self.origin_lon,
            self.origin_lon + self.width as f64 * self.scale_x,
        )
    }

    /// No-data sentinel declared by the file, if any.
    pub fn no_data_value(&self) -> Option<f32> {
        self.no_data_value
    }
}

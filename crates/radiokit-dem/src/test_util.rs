//! Synthetic GeoTIFF fixtures for unit tests.

use crate::GeoBoundingBox;
use std::io::{Cursor, Seek, Write};
use tiff::encoder::{colortype, DirectoryEncoder, TiffEncoder, TiffKind};
use tiff::tags::Tag;

pub(crate) struct SyntheticRaster {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub scale: f64,
    pub no_data: Option<f32>,
    /// Raw GDAL_NODATA text; wins over `no_data` when set.
    pub no_data_text: Option<String>,
    pub georeferenced: bool,
}

impl SyntheticRaster {
    /// `width × height` pixels of 0.1° anchored at (51 N, 115 W), value `row * 100 + col`.
    pub fn ramp(width: u32, height: u32) -> Self {
        let data = (0..height)
            .flat_map(|row| (0..width).map(move |col| (row * 100 + col) as f32))
            .collect();
        Self {
            width,
            height,
            data,
            origin_lon: -115.0,
            origin_lat: 51.0,
            scale: 0.1,
            no_data: None,
            no_data_text: None,
            georeferenced: true,
        }
    }

    /// Pixels of `scale` degrees covering `bbox`, filled by `value(row, col)`.
    pub fn covering(bbox: &GeoBoundingBox, scale: f64, value: impl Fn(u32, u32) -> f32) -> Self {
        let width = ((bbox.east() - bbox.west()) / scale).ceil() as u32;
        let height = ((bbox.north() - bbox.south()) / scale).ceil() as u32;
        let data = (0..height)
            .flat_map(|row| (0..width).map(move |col| (row, col)))
            .map(|(row, col)| value(row, col))
            .collect();
        Self {
            width,
            height,
            data,
            origin_lon: bbox.west(),
            origin_lat: bbox.north(),
            scale,
            no_data: None,
            no_data_text: None,
            georeferenced: true,
        }
    }
}

pub(crate) fn geotiff_bytes(raster: &SyntheticRaster) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let mut image = encoder
            .new_image::<colortype::Gray32Float>(raster.width, raster.height)
            .unwrap();
        if raster.georeferenced {
            write_geotransform(image.encoder(), raster.origin_lon, raster.origin_lat, raster.scale);
        }
        let no_data_text = raster
            .no_data_text
            .clone()
            .or_else(|| raster.no_data.map(|v| v.to_string()));
        if let Some(text) = no_data_text {
            image.encoder().write_tag(Tag::GdalNodata, text.as_str()).unwrap();
        }
        image.write_data(&raster.data).unwrap();
    }
    cursor.into_inner()
}

/// Three-band (RGB, chunky) GeoTIFF at the `ramp` georeference.
pub(crate) fn rgb_geotiff_bytes(width: u32, height: u32) -> Vec<u8> {
    let data: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let mut image = encoder.new_image::<colortype::RGB8>(width, height).unwrap();
        write_geotransform(image.encoder(), -115.0, 51.0, 0.1);
        image.write_data(&data).unwrap();
    }
    cursor.into_inner()
}

fn write_geotransform<W: Write + Seek, K: TiffKind>(
    dir: &mut DirectoryEncoder<'_, W, K>,
    origin_lon: f64,
    origin_lat: f64,
    scale: f64,
) {
    let tiepoint = [0.0, 0.0, 0.0, origin_lon, origin_lat, 0.0];
    let pixel_scale = [scale, scale, 0.0];
    dir.write_tag(Tag::ModelTiepointTag, &tiepoint[..]).unwrap();
    dir.write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..]).unwrap();
}

//! Shared fixtures for the link integration tests.

use radiokit_dem::{
    CacheConfig, CacheKey, DemFetcher, DemRequest, DemSource, GeoBoundingBox, SourceResponse, TileCache,
};
use radiokit_itm::{validate_pfl, ItmResult, P2pParams, PropagationModel, PropagationResult};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Encode a GeoTIFF covering `bbox` whose elevation rises 1 m per pixel eastwards.
pub fn sloped_geotiff(bbox: &GeoBoundingBox, scale: f64) -> Vec<u8> {
    let width = ((bbox.east() - bbox.west()) / scale).ceil() as u32;
    let height = ((bbox.north() - bbox.south()) / scale).ceil() as u32;
    let data: Vec<f32> = (0..height)
        .flat_map(|_| (0..width).map(|col| 1000.0 + col as f32))
        .collect();

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut cursor).unwrap();
        let mut image = encoder.new_image::<colortype::Gray32Float>(width, height).unwrap();
        let tiepoint = [0.0, 0.0, 0.0, bbox.west(), bbox.north(), 0.0];
        let pixel_scale = [scale, scale, 0.0];
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..]).unwrap();
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &pixel_scale[..]).unwrap();
        image.write_data(&data).unwrap();
    }
    cursor.into_inner()
}

/// [`DemSource`] returning a fixed body and counting calls.
pub struct FixedSource {
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl DemSource for FixedSource {
    fn fetch(&self, _request: &DemRequest, _key: &CacheKey) -> radiokit_dem::Result<SourceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SourceResponse {
            status: 200,
            body: self.body.clone(),
        })
    }
}

/// Fetcher over a temporary cache and a [`FixedSource`].
pub fn fetcher_with(dir: &TempDir, body: Vec<u8>) -> (DemFetcher, Arc<AtomicUsize>) {
    let cache = TileCache::open(CacheConfig {
        dir: dir.path().to_path_buf(),
        ..CacheConfig::default()
    })
    .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = FixedSource {
        body,
        calls: Arc::clone(&calls),
    };
    (DemFetcher::new(Arc::new(cache), Box::new(source)), calls)
}

/// Propagation model recording every PFL it receives.
#[derive(Default)]
pub struct RecordingModel {
    pub profiles: Mutex<Vec<Vec<f64>>>,
}

impl PropagationModel for RecordingModel {
    fn p2p_tls(&self, params: &P2pParams, pfl: &[f64]) -> ItmResult<PropagationResult> {
        params.validate()?;
        validate_pfl(pfl)?;
        self.profiles.lock().unwrap().push(pfl.to_vec());
        Ok(PropagationResult {
            status_code: 1,
            loss_db: 120.0 + pfl[0],
            warnings: vec!["Path distance is small - care must be taken with result".to_string()],
        })
    }
}

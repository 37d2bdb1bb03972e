//! Shared fixtures for the integration tests.

use radiokit_dem::{CacheKey, DemError, DemRequest, DemSource, GeoBoundingBox, SourceResponse};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Encode a georeferenced single-band GeoTIFF covering `bbox`.
pub fn geotiff_covering(bbox: &GeoBoundingBox, scale: f64, value: impl Fn(u32, u32) -> f32) -> Vec<u8> {
    let width = ((bbox.east() - bbox.west()) / scale).ceil() as u32;
    let height = ((bbox.north() - bbox.south()) / scale).ceil() as u32;
    let data: Vec<f32> = (0..height)
        .flat_map(|row| (0..width).map(move |col| (row, col)))
        .map(|(row, col)| value(row, col))
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

/// What a [`StubSource`] does when called.
#[derive(Clone)]
pub enum StubBehavior {
    /// Answer with a status and body.
    Respond(u16, Vec<u8>),
    /// Fail as a timed-out request would.
    TimeOut,
    /// Fail the test: no remote I/O is expected.
    Forbidden,
}

/// In-memory [`DemSource`] counting its calls.
pub struct StubSource {
    behavior: StubBehavior,
    calls: Arc<AtomicUsize>,
}

impl StubSource {
    pub fn new(behavior: StubBehavior) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                behavior,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

impl DemSource for StubSource {
    fn fetch(&self, _request: &DemRequest, key: &CacheKey) -> radiokit_dem::Result<SourceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StubBehavior::Respond(status, body) => Ok(SourceResponse {
                status: *status,
                body: body.clone(),
            }),
            StubBehavior::TimeOut => Err(DemError::RemoteFetchTimeout {
                key: key.to_string(),
                timeout: Duration::from_secs(60),
            }),
            StubBehavior::Forbidden => panic!("remote source called for cached key {}", key),
        }
    }
}

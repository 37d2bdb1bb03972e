//! Runner wiring against stub DEM sources.

use radiokit_dem::{CacheKey, DemError, DemRequest, DemSource, GeoBoundingBox, SourceResponse};
use radiokit_itm::{ItmResult, P2pParams, PropagationModel, PropagationResult};
use radiokit_link::{LinkError, MissingElevation};
use radiokit_runner::{Runner, RunnerConfig, RunnerError};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Flat 900 m GeoTIFF covering `bbox` at 0.005° per pixel.
fn flat_geotiff(bbox: &GeoBoundingBox) -> Vec<u8> {
    let scale = 0.005;
    let width = ((bbox.east() - bbox.west()) / scale).ceil() as u32;
    let height = ((bbox.north() - bbox.south()) / scale).ceil() as u32;
    let data = vec![900.0f32; (width * height) as usize];

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

/// Model recording the parameters of each call.
#[derive(Default)]
struct ParamsModel {
    seen: Mutex<Vec<P2pParams>>,
}

impl PropagationModel for ParamsModel {
    fn p2p_tls(&self, params: &P2pParams, _pfl: &[f64]) -> ItmResult<PropagationResult> {
        self.seen.lock().unwrap().push(params.clone());
        Ok(PropagationResult {
            status_code: 0,
            loss_db: 100.0,
            warnings: Vec::new(),
        })
    }
}

struct FixedSource {
    status: u16,
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl DemSource for FixedSource {
    fn fetch(&self, _request: &DemRequest, _key: &CacheKey) -> radiokit_dem::Result<SourceResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SourceResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

fn runner(dir: &std::path::Path, status: u16, body: &[u8]) -> (Runner, Arc<AtomicUsize>) {
    let mut config = RunnerConfig::default();
    config.cache.dir = dir.to_path_buf();
    let calls = Arc::new(AtomicUsize::new(0));
    let source = FixedSource {
        status,
        body: body.to_vec(),
        calls: Arc::clone(&calls),
    };
    (Runner::with_source(&config, Box::new(source)).unwrap(), calls)
}

#[test]
fn test_fetch_writes_through_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, calls) = runner(dir.path(), 200, b"not really a tiff");

    let (summary, bytes) = runner.fetch(51.0, -114.0, 10.0, "key").unwrap();
    assert_eq!(bytes, b"not really a tiff");
    assert_eq!(summary.bytes, bytes.len());
    assert_eq!(summary.dataset, "SRTMGL3");

    runner.fetch(51.0, -114.0, 10.0, "key").unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let stats = runner.close().unwrap();
    assert_eq!(stats.entries, 1);
}

#[test]
fn test_rejected_fetch_surfaces_status() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, _) = runner(dir.path(), 403, b"");

    let err = runner.fetch(51.0, -114.0, 10.0, "key").unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Dem(DemError::RemoteFetch { status: 403, .. })
    ));
}

#[test]
fn test_profile_over_undecodable_raster() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, calls) = runner(dir.path(), 200, b"garbage");

    let err = runner
        .profile((51.0, -114.0), 10.0, (51.0, -114.0), (51.05, -114.0), "key")
        .unwrap_err();
    assert!(matches!(err, RunnerError::Link(LinkError::Dem(_))));

    // the bad raster was dropped, so the next attempt goes back to the source
    let _ = runner.profile((51.0, -114.0), 10.0, (51.0, -114.0), (51.05, -114.0), "key");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_invalid_pipeline_config() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::default();
    config.cache.dir = dir.path().to_path_buf();
    config.pipeline.resolution = 20;
    let source = FixedSource {
        status: 200,
        body: Vec::new(),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    assert!(Runner::with_source(&config, Box::new(source)).is_err());
}

#[test]
fn test_predict_uses_configured_radio() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::default();
    config.cache.dir = dir.path().to_path_buf();
    config.radio.freq_mhz = 433.0;
    config.radio.h_tx_m = 35.0;
    config.pipeline.missing_elevation = MissingElevation::Fill(900.0);

    let bbox = GeoBoundingBox::around(51.0, -114.0, 10.0).unwrap();
    let source = FixedSource {
        status: 200,
        body: flat_geotiff(&bbox),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    let runner = Runner::with_source(&config, Box::new(source)).unwrap();
    assert_eq!(runner.radio(), &config.radio);

    // later edits to the config do not leak into the runner
    config.radio.freq_mhz = 2400.0;

    let model = ParamsModel::default();
    let prediction = runner
        .predict(&model, (51.0, -114.0), 10.0, (51.0, -114.0), (51.04, -114.0), "key")
        .unwrap()
        .unwrap();
    assert_eq!(prediction.path_loss_db, 100.0);

    let seen = model.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].freq_mhz, 433.0);
    assert_eq!(seen[0].h_tx_m, 35.0);
}

#[test]
fn test_invalid_radio_rejected_at_construction() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = RunnerConfig::default();
    config.cache.dir = dir.path().to_path_buf();
    config.radio.freq_mhz = 5.0;
    let source = FixedSource {
        status: 200,
        body: Vec::new(),
        calls: Arc::new(AtomicUsize::new(0)),
    };
    assert!(matches!(
        Runner::with_source(&config, Box::new(source)),
        Err(RunnerError::Itm(_))
    ));
}

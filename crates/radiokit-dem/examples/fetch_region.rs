//! Fetch a DEM around a point and sample it onto a hex grid.
//!
//! Usage:
//!
//! ```text
//! OPENTOPO_API_KEY=... cargo run -p radiokit-dem --example fetch_region -- 51.0447 -114.0719 100
//! ```

use radiokit_dem::{
    CacheConfig, Dataset, DemFetcher, FetcherConfig, GeoBoundingBox, GridSampler, SamplerConfig, TileCache,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 4 {
        eprintln!("usage: {} <lat> <lon> <radius_km> [dataset] [resolution]", args[0]);
        std::process::exit(2);
    }

    let lat: f64 = args[1].parse()?;
    let lon: f64 = args[2].parse()?;
    let radius_km: f64 = args[3].parse()?;
    let dataset: Dataset = args.get(4).map(|s| s.parse()).transpose()?.unwrap_or_default();
    let resolution: u8 = args.get(5).map(|s| s.parse()).transpose()?.unwrap_or(8);
    let api_key = std::env::var("OPENTOPO_API_KEY")?;

    let bbox = GeoBoundingBox::around(lat, lon, radius_km)?;
    println!("Bounding box: {}", bbox);

    let cache = Arc::new(TileCache::open(CacheConfig::default())?);
    let fetcher = DemFetcher::open_topography(cache, &FetcherConfig::default())?;
    let bytes = fetcher.fetch_region(dataset, lat, lon, radius_km, &api_key)?;
    println!("{} bytes of {} ({:?})", bytes.len(), dataset, fetcher.stats());

    let grid = GridSampler::new(&SamplerConfig::default())?.sample(&bytes, &bbox, resolution)?;
    println!("{} cells at resolution {}", grid.len(), resolution);

    let stats = fetcher.cache().close()?;
    println!("Cache: {} entries, {} bytes", stats.entries, stats.size_bytes);
    Ok(())
}

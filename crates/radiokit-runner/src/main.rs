//! `radiokit`: terrain retrieval and path loss from the command line.

use clap::{Parser, Subcommand};
use radiokit_dem::{Dataset, GeoBoundingBox};
use radiokit_itm::{Climate, Itm, Polarization};
use radiokit_runner::{
    default_radius_km, init_logging, parse_coordinate, resolve_api_key, Result, Runner, RunnerConfig,
    API_KEY_ENV,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "radiokit")]
#[command(version, about = "Terrain profiles and ITM path loss from OpenTopography DEMs", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// OpenTopography API key (defaults to $OPENTOPO_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Elevation dataset, e.g. SRTMGL3 or COP30
    #[arg(long, global = true, value_parser = parse_dataset)]
    dataset: Option<Dataset>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the bounding box of a circle
    Bbox {
        #[command(flatten)]
        region: RegionArgs,
    },

    /// Fetch (or read from cache) the DEM raster for a circle
    Fetch {
        #[command(flatten)]
        region: RegionArgs,

        /// Write the GeoTIFF here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the terrain profile between two points as JSON
    Profile {
        #[command(flatten)]
        path: PathArgs,
    },

    /// Predict ITM path loss between two points
    Predict {
        #[command(flatten)]
        path: PathArgs,

        /// Path to the ITM shared library
        #[arg(long)]
        itm_lib: Option<PathBuf>,

        /// Frequency, MHz
        #[arg(long)]
        freq_mhz: Option<f64>,

        /// Transmitter height above ground, meters
        #[arg(long)]
        tx_height_m: Option<f64>,

        /// Receiver height above ground, meters
        #[arg(long)]
        rx_height_m: Option<f64>,

        /// Radio climate, e.g. continental_temperate
        #[arg(long, value_parser = parse_climate)]
        climate: Option<Climate>,

        /// Antenna polarization: horizontal or vertical
        #[arg(long, value_parser = parse_polarization)]
        polarization: Option<Polarization>,
    },
}

#[derive(clap::Args)]
struct RegionArgs {
    /// Center latitude, degrees
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Center longitude, degrees
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// Radius in kilometers
    #[arg(long)]
    radius_km: f64,
}

#[derive(clap::Args)]
struct PathArgs {
    /// Terrain center latitude (defaults to the origin)
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Terrain center longitude (defaults to the origin)
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    /// Origin as LAT,LON
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    from: (f64, f64),

    /// Target as LAT,LON
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    to: (f64, f64),

    /// Hex resolution (0-15)
    #[arg(long)]
    resolution: Option<u8>,

    /// Skip pairs further apart than this, kilometers
    #[arg(long)]
    max_distance_km: Option<f64>,

    /// Terrain radius, kilometers (defaults to the max distance)
    #[arg(long)]
    radius_km: Option<f64>,
}

fn parse_dataset(s: &str) -> std::result::Result<Dataset, String> {
    s.parse().map_err(|e: radiokit_dem::DemError| e.to_string())
}

fn parse_climate(s: &str) -> std::result::Result<Climate, String> {
    s.parse().map_err(|e: radiokit_itm::ItmError| e.to_string())
}

fn parse_polarization(s: &str) -> std::result::Result<Polarization, String> {
    s.parse().map_err(|e: radiokit_itm::ItmError| e.to_string())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        error!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(dir) = &cli.cache_dir {
        config.cache.dir = dir.clone();
    }
    if let Some(dataset) = cli.dataset {
        config.pipeline.dataset = dataset;
    }

    match cli.command {
        Commands::Bbox { region } => {
            let bbox = GeoBoundingBox::around(region.lat, region.lon, region.radius_km)?;
            print_json(&bbox)
        }

        Commands::Fetch { region, output } => {
            let api_key = api_key(&cli.api_key)?;
            config.validate()?;
            let runner = Runner::new(&config)?;
            let (summary, bytes) = runner.fetch(region.lat, region.lon, region.radius_km, &api_key)?;
            if let Some(path) = output {
                std::fs::write(&path, &bytes)?;
                info!(path = %path.display(), bytes = bytes.len(), "wrote GeoTIFF");
            }
            print_json(&summary)?;
            runner.close()?;
            Ok(())
        }

        Commands::Profile { path } => {
            let api_key = api_key(&cli.api_key)?;
            path.apply(&mut config);
            config.validate()?;
            let runner = Runner::new(&config)?;
            let profile = runner.profile(path.center(), path.radius_km(&config), path.from, path.to, &api_key)?;
            if profile.is_none() {
                info!("endpoints are further apart than the maximum distance");
            }
            print_json(&profile)?;
            runner.close()?;
            Ok(())
        }

        Commands::Predict {
            path,
            itm_lib,
            freq_mhz,
            tx_height_m,
            rx_height_m,
            climate,
            polarization,
        } => {
            let api_key = api_key(&cli.api_key)?;
            path.apply(&mut config);
            if let Some(freq) = freq_mhz {
                config.radio.freq_mhz = freq;
            }
            if let Some(h) = tx_height_m {
                config.radio.h_tx_m = h;
            }
            if let Some(h) = rx_height_m {
                config.radio.h_rx_m = h;
            }
            if let Some(climate) = climate {
                config.radio.climate = climate;
                config.radio.n_0 = climate.typical_refractivity();
            }
            if let Some(polarization) = polarization {
                config.radio.polarization = polarization;
            }
            config.validate()?;

            let itm = match itm_lib {
                Some(lib) => Itm::from_path(lib)?,
                None => Itm::new()?,
            };
            let runner = Runner::new(&config)?;
            let prediction = runner.predict(
                &itm,
                path.center(),
                path.radius_km(&config),
                path.from,
                path.to,
                &api_key,
            )?;
            print_json(&prediction)?;
            runner.close()?;
            Ok(())
        }
    }
}

impl PathArgs {
    fn center(&self) -> (f64, f64) {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => self.from,
        }
    }

    fn radius_km(&self, config: &RunnerConfig) -> f64 {
        self.radius_km.unwrap_or_else(|| default_radius_km(config))
    }

    fn apply(&self, config: &mut RunnerConfig) {
        if let Some(resolution) = self.resolution {
            config.pipeline.resolution = resolution;
        }
        if let Some(km) = self.max_distance_km {
            config.pipeline.max_distance_m = km * 1000.0;
        }
    }
}

fn api_key(flag: &Option<String>) -> Result<String> {
    resolve_api_key(flag.as_deref(), std::env::var(API_KEY_ENV).ok())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

//! # radiokit-link
//!
//! Terrain path profiles over hex elevation grids, and path loss predictions
//! from those profiles.
//!
//! ## Features
//!
//! - **Path Profiles**: elevation samples along the H3 grid path between two
//!   cells, with pairs beyond a maximum distance filtered out
//! - **Terrain Pipeline**: bounding box, cached DEM fetch and hex sampling in
//!   one call, with the sampled grid cached as well
//! - **Prediction**: ITM terrain profiles built from path profiles and fed to
//!   any [`radiokit_itm::PropagationModel`]

mod error;
mod pipeline;
mod profile;

pub use error::{LinkError, Result};
pub use pipeline::{
    predict_profile, LinkPrediction, PipelineConfig, TerrainGrid, TerrainInfo, TerrainPipeline,
    DEFAULT_MAX_DISTANCE_M, DEFAULT_RESOLUTION,
};
pub use profile::{cell_at, cell_distance_m, MissingElevation, PathProfile, ProfileBuilder};

//! Error types for the link crate.

use radiokit_dem::DemError;
use radiokit_itm::ItmError;
use thiserror::Error;

/// Errors from building profiles and predicting path loss.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Terrain retrieval or sampling failed.
    #[error("DEM error: {0}")]
    Dem(#[from] DemError),

    /// The propagation model rejected the inputs or failed.
    #[error("ITM error: {0}")]
    Itm(#[from] ItmError),

    /// Malformed input, such as cells at the wrong resolution.
    #[error("Validation error: {0}")]
    Validation(String),

    /// No grid path exists between two cells.
    #[error("Grid path error: {0}")]
    GridPath(String),

    /// A profile sample has no elevation and the policy rejects gaps.
    #[error("No elevation for profile sample {index}")]
    MissingElevation {
        /// Position of the sample along the path.
        index: usize,
    },
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

//! OpenTopography global DEM products.

use crate::DemError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A digital elevation model offered by the OpenTopography global DEM API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dataset {
    /// SRTM GL3 (90m)
    #[serde(rename = "SRTMGL3")]
    Srtmgl3,
    /// SRTM GL1 (30m)
    #[serde(rename = "SRTMGL1")]
    Srtmgl1,
    /// SRTM GL1 ellipsoidal (30m)
    #[serde(rename = "SRTMGL1_E")]
    Srtmgl1E,
    /// ALOS World 3D (30m)
    #[serde(rename = "AW3D30")]
    Aw3d30,
    /// ALOS World 3D ellipsoidal (30m)
    #[serde(rename = "AW3D30_E")]
    Aw3d30E,
    /// NASADEM (30m)
    #[serde(rename = "NASADEM")]
    Nasadem,
    /// Copernicus global DSM (30m)
    #[serde(rename = "COP30")]
    Cop30,
    /// Copernicus global DSM (90m)
    #[serde(rename = "COP90")]
    Cop90,
    /// Continental Europe digital terrain model (30m)
    #[serde(rename = "EU_DTM")]
    EuDtm,
    /// GEDI L3 (1000m)
    #[serde(rename = "GEDI_L3")]
    GediL3,
}

impl Dataset {
    /// Every supported dataset.
    pub const ALL: [Dataset; 10] = [
        Dataset::Srtmgl3,
        Dataset::Srtmgl1,
        Dataset::Srtmgl1E,
        Dataset::Aw3d30,
        Dataset::Aw3d30E,
        Dataset::Nasadem,
        Dataset::Cop30,
        Dataset::Cop90,
        Dataset::EuDtm,
        Dataset::GediL3,
    ];

    /// The `demtype` identifier used by the provider API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Srtmgl3 => "SRTMGL3",
            Dataset::Srtmgl1 => "SRTMGL1",
            Dataset::Srtmgl1E => "SRTMGL1_E",
            Dataset::Aw3d30 => "AW3D30",
            Dataset::Aw3d30E => "AW3D30_E",
            Dataset::Nasadem => "NASADEM",
            Dataset::Cop30 => "COP30",
            Dataset::Cop90 => "COP90",
            Dataset::EuDtm => "EU_DTM",
            Dataset::GediL3 => "GEDI_L3",
        }
    }
}

impl Default for Dataset {
    fn default() -> Self {
        Dataset::Srtmgl3
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = DemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dataset::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                DemError::Validation(format!(
                    "unsupported dataset '{}' (expected one of {})",
                    s,
                    Dataset::ALL.map(|d| d.as_str()).join(", ")
                ))
            })
    }
}

//! ITM inputs, outputs and terrain profiles.

use crate::{ItmError, ItmInput, ItmResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::os::raw::c_long;
use std::str::FromStr;

/// ITM radio climate zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Climate {
    /// Equatorial (Congo, Ecuador)
    Equatorial = 1,
    /// Continental subtropical (Sudan)
    ContinentalSubtropical = 2,
    /// Maritime subtropical (West Africa coast)
    #[serde(rename = "maritime_tropical", alias = "maritime_subtropical")]
    MaritimeSubtropical = 3,
    /// Desert (Sahara)
    Desert = 4,
    /// Continental temperate, the usual choice for inland paths
    ContinentalTemperate = 5,
    /// Maritime temperate, path over land (UK, US west coast)
    MaritimeTemperateOverLand = 6,
    /// Maritime temperate, path over sea
    MaritimeTemperateOverSea = 7,
}

impl Climate {
    /// Every climate, in code order.
    pub const ALL: [Climate; 7] = [
        Climate::Equatorial,
        Climate::ContinentalSubtropical,
        Climate::MaritimeSubtropical,
        Climate::Desert,
        Climate::ContinentalTemperate,
        Climate::MaritimeTemperateOverLand,
        Climate::MaritimeTemperateOverSea,
    ];

    /// ITM climate code (1-7).
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Configuration name of the climate.
    pub fn name(self) -> &'static str {
        match self {
            Climate::Equatorial => "equatorial",
            Climate::ContinentalSubtropical => "continental_subtropical",
            Climate::MaritimeSubtropical => "maritime_tropical",
            Climate::Desert => "desert",
            Climate::ContinentalTemperate => "continental_temperate",
            Climate::MaritimeTemperateOverLand => "maritime_temperate_over_land",
            Climate::MaritimeTemperateOverSea => "maritime_temperate_over_sea",
        }
    }

    /// Typical surface refractivity (N-Units) for this climate.
    pub fn typical_refractivity(self) -> f64 {
        match self {
            Climate::Equatorial => refractivity::EQUATORIAL,
            Climate::ContinentalSubtropical => refractivity::CONTINENTAL_SUBTROPICAL,
            Climate::MaritimeSubtropical => refractivity::MARITIME_SUBTROPICAL,
            Climate::Desert => refractivity::DESERT,
            Climate::ContinentalTemperate => refractivity::CONTINENTAL_TEMPERATE,
            Climate::MaritimeTemperateOverLand => refractivity::MARITIME_TEMPERATE_LAND,
            Climate::MaritimeTemperateOverSea => refractivity::MARITIME_TEMPERATE_SEA,
        }
    }
}

impl fmt::Display for Climate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Climate {
    type Err = ItmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        if lower == "maritime_subtropical" {
            return Ok(Climate::MaritimeSubtropical);
        }
        Climate::ALL
            .iter()
            .copied()
            .find(|c| c.name() == lower)
            .ok_or_else(|| ItmError::InvalidName {
                field: "climate",
                value: s.to_string(),
                expected: Climate::ALL.map(|c| c.name()).join(", "),
            })
    }
}

/// Antenna polarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum Polarization {
    Horizontal = 0,
    Vertical = 1,
}

impl Polarization {
    /// ITM polarization code.
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl FromStr for Polarization {
    type Err = ItmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "horizontal" | "0" => Ok(Polarization::Horizontal),
            "vertical" | "1" => Ok(Polarization::Vertical),
            _ => Err(ItmError::InvalidName {
                field: "polarization",
                value: s.to_string(),
                expected: "horizontal, vertical".to_string(),
            }),
        }
    }
}

/// ITM `mdvar`: how time, location and situation variability combine.
///
/// A base mode 0-3, optionally offset by 10 (location variability
/// eliminated) and/or 20 (situation variability eliminated).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeOfVariability(pub i32);

impl ModeOfVariability {
    /// Single message
    pub const SINGLE_MESSAGE: Self = Self(0);
    /// Accidental
    pub const ACCIDENTAL: Self = Self(1);
    /// Mobile
    pub const MOBILE: Self = Self(2);
    /// Broadcast
    pub const BROADCAST: Self = Self(3);

    /// This mode with location variability removed.
    pub fn without_location(self) -> Self {
        if self.0 % 20 >= 10 {
            self
        } else {
            Self(self.0 + 10)
        }
    }

    /// This mode with situation variability removed.
    pub fn without_situation(self) -> Self {
        if self.0 >= 20 {
            self
        } else {
            Self(self.0 + 20)
        }
    }

    /// Whether ITM accepts this code: a base mode 0-3 plus 0, 10, 20 or 30.
    pub fn is_valid(self) -> bool {
        (0..=33).contains(&self.0) && self.0 % 10 <= 3
    }
}

impl Default for ModeOfVariability {
    fn default() -> Self {
        Self::SINGLE_MESSAGE
    }
}

impl From<ModeOfVariability> for i32 {
    fn from(ModeOfVariability(code): ModeOfVariability) -> i32 {
        code
    }
}

/// Warning bitmask written by `ITM_P2P_TLS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItmWarnings {
    bits: i64,
}

/// Bit and message for each ITM warning flag.
const WARNING_MESSAGES: [(i64, &str); 15] = [
    (0x0001, "TX terminal height is near its limits"),
    (0x0002, "RX terminal height is near its limits"),
    (0x0004, "Frequency is near its limits"),
    (0x0008, "Path distance is near its upper limit"),
    (0x0010, "Path distance is large - care must be taken with result"),
    (0x0020, "Path distance is near its lower limit"),
    (0x0040, "Path distance is small - care must be taken with result"),
    (0x0080, "TX horizon angle is large - small angle approximations could break down"),
    (0x0100, "RX horizon angle is large - small angle approximations could break down"),
    (0x0200, "TX horizon distance is less than 1/10 of the smooth earth horizon distance"),
    (0x0400, "RX horizon distance is less than 1/10 of the smooth earth horizon distance"),
    (0x0800, "TX horizon distance is greater than 3 times the smooth earth horizon distance"),
    (0x1000, "RX horizon distance is greater than 3 times the smooth earth horizon distance"),
    (0x2000, "One of the provided variabilities is located far in the tail of its distribution"),
    (0x4000, "Internally computed surface refractivity value is small - care must be taken with result"),
];

impl ItmWarnings {
    pub fn from_bits(bits: c_long) -> Self {
        Self { bits: i64::from(bits) }
    }

    pub fn bits(&self) -> i64 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Human-readable message for each set flag, lowest bit first.
    pub fn messages(&self) -> Vec<String> {
        WARNING_MESSAGES
            .iter()
            .filter(|(bit, _)| self.bits & bit != 0)
            .map(|(_, message)| message.to_string())
            .collect()
    }
}

/// Inputs to a point-to-point time/location/situation prediction.
///
/// Variability percentages are in the open interval (0, 100).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2pParams {
    /// Transmitter antenna height above ground, meters
    pub h_tx_m: f64,
    /// Receiver antenna height above ground, meters
    pub h_rx_m: f64,
    /// Radio climate
    pub climate: Climate,
    /// Surface refractivity, N-Units
    pub n_0: f64,
    /// Frequency, MHz
    pub freq_mhz: f64,
    /// Antenna polarization
    pub polarization: Polarization,
    /// Relative permittivity of the ground
    pub epsilon: f64,
    /// Ground conductivity, S/m
    pub sigma: f64,
    /// Mode of variability
    pub mdvar: ModeOfVariability,
    /// Time percentage
    pub time_pct: f64,
    /// Location percentage
    pub location_pct: f64,
    /// Situation percentage
    pub situation_pct: f64,
}

impl Default for P2pParams {
    fn default() -> Self {
        let (epsilon, sigma) = ground_constants::AVERAGE_GROUND;
        Self {
            h_tx_m: 20.0,
            h_rx_m: 10.0,
            climate: Climate::ContinentalTemperate,
            n_0: refractivity::CONTINENTAL_TEMPERATE,
            freq_mhz: 900.0,
            polarization: Polarization::Vertical,
            epsilon,
            sigma,
            mdvar: ModeOfVariability::SINGLE_MESSAGE,
            time_pct: 50.0,
            location_pct: 50.0,
            situation_pct: 50.0,
        }
    }
}

impl P2pParams {
    /// Check every input against the ranges ITM accepts.
    pub fn validate(&self) -> ItmResult<()> {
        fn pct(value: f64) -> bool {
            value > 0.0 && value < 100.0
        }

        if !(0.5..=3000.0).contains(&self.h_tx_m) {
            return Err(ItmError::out_of_range(ItmInput::TxHeight));
        }
        if !(0.5..=3000.0).contains(&self.h_rx_m) {
            return Err(ItmError::out_of_range(ItmInput::RxHeight));
        }
        if !(250.0..=400.0).contains(&self.n_0) {
            return Err(ItmError::out_of_range(ItmInput::Refractivity));
        }
        if !(20.0..=20000.0).contains(&self.freq_mhz) {
            return Err(ItmError::out_of_range(ItmInput::Frequency));
        }
        if !(self.epsilon >= 1.0 && self.epsilon.is_finite()) {
            return Err(ItmError::out_of_range(ItmInput::Epsilon));
        }
        if !(self.sigma > 0.0 && self.sigma.is_finite()) {
            return Err(ItmError::out_of_range(ItmInput::Sigma));
        }
        if !self.mdvar.is_valid() {
            return Err(ItmError::out_of_range(ItmInput::Mdvar));
        }
        if !pct(self.time_pct) {
            return Err(ItmError::out_of_range(ItmInput::Time));
        }
        if !pct(self.location_pct) {
            return Err(ItmError::out_of_range(ItmInput::Location));
        }
        if !pct(self.situation_pct) {
            return Err(ItmError::out_of_range(ItmInput::Situation));
        }
        Ok(())
    }
}

/// Outcome of one successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropagationResult {
    /// ITM return code: 0 for success, 1 for success with warnings.
    pub status_code: i32,
    /// Median basic transmission loss, dB.
    pub loss_db: f64,
    /// Decoded warning messages, empty when the result is clean.
    pub warnings: Vec<String>,
}

/// Ground electrical constants as `(epsilon, sigma S/m)`.
pub mod ground_constants {
    pub const AVERAGE_GROUND: (f64, f64) = (15.0, 0.005);
    pub const POOR_GROUND: (f64, f64) = (4.0, 0.001);
    pub const GOOD_GROUND: (f64, f64) = (25.0, 0.02);
    pub const FRESH_WATER: (f64, f64) = (81.0, 0.01);
    pub const SEA_WATER: (f64, f64) = (81.0, 5.0);
}

/// Surface refractivity (N-Units) typical of each climate zone.
pub mod refractivity {
    pub const EQUATORIAL: f64 = 360.0;
    pub const CONTINENTAL_SUBTROPICAL: f64 = 320.0;
    pub const MARITIME_SUBTROPICAL: f64 = 370.0;
    pub const DESERT: f64 = 280.0;
    pub const CONTINENTAL_TEMPERATE: f64 = 301.0;
    pub const MARITIME_TEMPERATE_LAND: f64 = 320.0;
    pub const MARITIME_TEMPERATE_SEA: f64 = 350.0;
}

/// Evenly spaced elevation samples along a path, convertible to the ITM
/// PFL array.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainProfile {
    spacing_m: f64,
    elevations: Vec<f64>,
}

impl TerrainProfile {
    /// Samples `spacing_m` apart.
    pub fn from_elevations(spacing_m: f64, elevations: &[f64]) -> Self {
        Self {
            spacing_m,
            elevations: elevations.to_vec(),
        }
    }

    /// Create from elevations spread evenly over a path of `distance_meter`.
    pub fn from_path(distance_meter: f64, elevations: &[f64]) -> ItmResult<Self> {
        if elevations.len() < 2 {
            return Err(ItmError::InvalidTerrainProfile(format!(
                "need at least 2 elevation samples, got {}",
                elevations.len()
            )));
        }
        Ok(Self::from_elevations(
            distance_meter / (elevations.len() - 1) as f64,
            elevations,
        ))
    }

    /// `[intervals, spacing_m, elevations...]` where `intervals` is one less
    /// than the sample count.
    pub fn to_pfl(&self) -> ItmResult<Vec<f64>> {
        let intervals = self.elevations.len().saturating_sub(1) as f64;
        let pfl: Vec<f64> = [intervals, self.spacing_m]
            .into_iter()
            .chain(self.elevations.iter().copied())
            .collect();
        validate_pfl(&pfl)?;
        Ok(pfl)
    }

    /// Path length covered by the samples, meters.
    pub fn path_distance_m(&self) -> f64 {
        self.elevations.len().saturating_sub(1) as f64 * self.spacing_m
    }
}

/// Check that `pfl` is a well-formed ITM terrain profile.
pub fn validate_pfl(pfl: &[f64]) -> ItmResult<()> {
    if pfl.len() < 4 {
        return Err(ItmError::InvalidTerrainProfile(format!(
            "need at least 2 elevation samples, got {}",
            pfl.len().saturating_sub(2)
        )));
    }
    let intervals = pfl[0];
    if intervals.fract() != 0.0 || intervals as usize + 3 != pfl.len() {
        return Err(ItmError::InvalidTerrainProfile(format!(
            "interval count {} does not match {} elevation samples",
            intervals,
            pfl.len() - 2
        )));
    }
    if !(pfl[1] > 0.0 && pfl[1].is_finite()) {
        return Err(ItmError::InvalidTerrainProfile(format!(
            "sample spacing {} must be positive",
            pfl[1]
        )));
    }
    if let Some(i) = pfl[2..].iter().position(|e| !e.is_finite()) {
        return Err(ItmError::InvalidTerrainProfile(format!(
            "elevation sample {} is not finite",
            i
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_climate_names() {
        for climate in Climate::ALL {
            assert_eq!(climate.name().parse::<Climate>().unwrap(), climate);
        }
        assert_eq!("maritime_tropical".parse::<Climate>().unwrap().code(), 3);
        assert_eq!("Maritime_Subtropical".parse::<Climate>().unwrap().code(), 3);
        assert_eq!("continental_temperate".parse::<Climate>().unwrap().code(), 5);
        assert!(matches!(
            "tundra".parse::<Climate>(),
            Err(ItmError::InvalidName { field: "climate", .. })
        ));
    }

    #[test]
    fn test_polarization_parse() {
        assert_eq!("vertical".parse::<Polarization>().unwrap().code(), 1);
        assert_eq!("0".parse::<Polarization>().unwrap(), Polarization::Horizontal);
        assert!("circular".parse::<Polarization>().is_err());
    }

    #[test]
    fn test_mdvar_validity() {
        assert!(ModeOfVariability::BROADCAST.is_valid());
        assert_eq!(ModeOfVariability::MOBILE.without_location(), ModeOfVariability(12));
        let both = ModeOfVariability::ACCIDENTAL.without_location().without_situation();
        assert_eq!(both, ModeOfVariability(31));
        assert!(both.is_valid());
        // already removed
        assert_eq!(both.without_location().without_situation(), both);
        assert!(!ModeOfVariability(4).is_valid());
        assert!(!ModeOfVariability(-1).is_valid());
        assert!(!ModeOfVariability(34).is_valid());
    }

    #[test]
    fn test_warning_messages() {
        assert!(ItmWarnings::from_bits(0).is_empty());
        assert!(ItmWarnings::from_bits(0).messages().is_empty());

        let warnings = ItmWarnings::from_bits(0x0001 | 0x0040 | 0x4000);
        let messages = warnings.messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "TX terminal height is near its limits");
        assert_eq!(messages[1], "Path distance is small - care must be taken with result");
        assert!(messages[2].starts_with("Internally computed surface refractivity"));

        assert_eq!(ItmWarnings::from_bits(0x7FFF).messages().len(), 15);
    }

    #[test]
    fn test_default_params_valid() {
        P2pParams::default().validate().unwrap();
    }

    #[test]
    fn test_params_range_checks() {
        let base = P2pParams::default();

        let p = P2pParams { h_tx_m: 0.1, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::TxHeight })));
        let p = P2pParams { h_rx_m: 5000.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::RxHeight })));
        let p = P2pParams { freq_mhz: 10.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Frequency })));
        let p = P2pParams { n_0: 200.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Refractivity })));
        let p = P2pParams { sigma: 0.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Sigma })));
        let p = P2pParams { epsilon: 0.5, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Epsilon })));
        let p = P2pParams { mdvar: ModeOfVariability(7), ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Mdvar })));
        // Fractions are not percentages at the boundary
        let p = P2pParams { time_pct: 0.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Time })));
        let p = P2pParams { location_pct: 100.0, ..base.clone() };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Location })));
        let p = P2pParams { situation_pct: f64::NAN, ..base };
        assert!(matches!(p.validate(), Err(ItmError::OutOfRange { input: ItmInput::Situation })));
    }

    #[test]
    fn test_params_from_yaml() {
        let yaml = "climate: maritime_temperate_over_sea\npolarization: horizontal\nfreq_mhz: 433.0\nmdvar: 12\n";
        let params: P2pParams = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(params.climate, Climate::MaritimeTemperateOverSea);
        assert_eq!(params.polarization, Polarization::Horizontal);
        assert_eq!(params.mdvar, ModeOfVariability(12));
        assert_eq!(params.h_tx_m, 20.0);
        params.validate().unwrap();
    }

    #[test]
    fn test_pfl_layout() {
        let profile = TerrainProfile::from_path(1000.0, &[100.0, 110.0, 120.0, 130.0, 140.0]).unwrap();
        let pfl = profile.to_pfl().unwrap();

        assert_eq!(pfl[0], 4.0);
        assert_relative_eq!(pfl[1], 250.0);
        assert_eq!(&pfl[2..], &[100.0, 110.0, 120.0, 130.0, 140.0]);
        assert_relative_eq!(profile.path_distance_m(), 1000.0);
    }

    #[test]
    fn test_pfl_rejects_short_or_malformed() {
        assert!(TerrainProfile::from_path(1000.0, &[100.0]).is_err());
        assert!(TerrainProfile::from_elevations(10.0, &[1.0]).to_pfl().is_err());
        assert!(TerrainProfile::from_elevations(0.0, &[1.0, 2.0]).to_pfl().is_err());
        assert!(TerrainProfile::from_elevations(10.0, &[1.0, f64::NAN]).to_pfl().is_err());
        assert!(validate_pfl(&[5.0, 10.0, 1.0, 2.0]).is_err());
        assert!(validate_pfl(&[1.0, 10.0, 1.0, 2.0]).is_ok());
    }
}

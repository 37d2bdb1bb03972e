//! ITM error taxonomy.

use std::fmt;
use thiserror::Error;

/// Result type for ITM operations.
pub type ItmResult<T> = Result<T, ItmError>;

/// A model input the ITM library range-checks.
///
/// Discriminants are the error codes `ITM_P2P_TLS` returns when the input is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItmInput {
    TxHeight = 1000,
    RxHeight = 1001,
    Climate = 1002,
    Time = 1003,
    Location = 1004,
    Situation = 1005,
    Confidence = 1006,
    Reliability = 1007,
    Refractivity = 1008,
    Frequency = 1009,
    Polarization = 1010,
    Epsilon = 1011,
    Sigma = 1012,
    Mdvar = 1013,
    Distance = 1014,
    DeltaH = 1016,
    SitingCriteria = 1017,
}

impl ItmInput {
    const ALL: [ItmInput; 17] = [
        ItmInput::TxHeight,
        ItmInput::RxHeight,
        ItmInput::Climate,
        ItmInput::Time,
        ItmInput::Location,
        ItmInput::Situation,
        ItmInput::Confidence,
        ItmInput::Reliability,
        ItmInput::Refractivity,
        ItmInput::Frequency,
        ItmInput::Polarization,
        ItmInput::Epsilon,
        ItmInput::Sigma,
        ItmInput::Mdvar,
        ItmInput::Distance,
        ItmInput::DeltaH,
        ItmInput::SitingCriteria,
    ];

    /// Model return code for this input.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Input rejected by a model return code, if the code names one.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|input| input.code() == code)
    }

    /// Accepted values, as the ITM documentation states them.
    pub fn accepted(self) -> &'static str {
        match self {
            ItmInput::TxHeight | ItmInput::RxHeight => "0.5 to 3000 m",
            ItmInput::Climate => "1 to 7",
            ItmInput::Time
            | ItmInput::Location
            | ItmInput::Situation
            | ItmInput::Confidence
            | ItmInput::Reliability => "strictly between 0 and 100",
            ItmInput::Refractivity => "250 to 400 N-Units",
            ItmInput::Frequency => "20 to 20000 MHz",
            ItmInput::Polarization => "0 or 1",
            ItmInput::Epsilon => "at least 1",
            ItmInput::Sigma => "greater than 0 S/m",
            ItmInput::Mdvar => "0 to 3, plus 10 and/or 20",
            ItmInput::Distance => "1 to 2000 km",
            ItmInput::DeltaH => "0 m or more",
            ItmInput::SitingCriteria => "0, 1 or 2",
        }
    }
}

impl fmt::Display for ItmInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItmInput::TxHeight => "transmitter height",
            ItmInput::RxHeight => "receiver height",
            ItmInput::Climate => "climate",
            ItmInput::Time => "time percentage",
            ItmInput::Location => "location percentage",
            ItmInput::Situation => "situation percentage",
            ItmInput::Confidence => "confidence percentage",
            ItmInput::Reliability => "reliability percentage",
            ItmInput::Refractivity => "surface refractivity",
            ItmInput::Frequency => "frequency",
            ItmInput::Polarization => "polarization",
            ItmInput::Epsilon => "relative permittivity",
            ItmInput::Sigma => "ground conductivity",
            ItmInput::Mdvar => "mode of variability",
            ItmInput::Distance => "path distance",
            ItmInput::DeltaH => "terrain irregularity",
            ItmInput::SitingCriteria => "siting criteria",
        };
        f.write_str(name)
    }
}

/// Errors from loading or calling the ITM library.
#[derive(Debug, Error)]
pub enum ItmError {
    #[error("ITM library not found at {0}; set RADIOKIT_ITM_LIB to its location")]
    LibraryNotFound(String),

    #[error("Failed to load ITM library: {0}")]
    LoadError(String),

    #[error("Symbol not found in ITM library: {0}")]
    SymbolNotFound(String),

    /// A categorical parameter could not be parsed.
    #[error("Invalid {field}: '{value}' (expected one of {expected})")]
    InvalidName {
        field: &'static str,
        value: String,
        expected: String,
    },

    /// An input outside the range ITM accepts, caught locally or reported by
    /// the model.
    #[error("ITM {input} out of range (expected {})", .input.accepted())]
    OutOfRange { input: ItmInput },

    #[error("Invalid terrain profile: {0}")]
    InvalidTerrainProfile(String),

    /// A model return code with no known meaning.
    #[error("ITM returned error code {0}")]
    Unknown(i32),
}

impl ItmError {
    /// Map a model return code (>= 1000) to an error.
    pub fn from_code(code: i32) -> Self {
        if code == 1018 {
            return ItmError::InvalidTerrainProfile("rejected by ITM".to_string());
        }
        match ItmInput::from_code(code) {
            Some(input) => ItmError::OutOfRange { input },
            None => ItmError::Unknown(code),
        }
    }

    pub(crate) fn out_of_range(input: ItmInput) -> Self {
        ItmError::OutOfRange { input }
    }
}

//! # radiokit-itm
//!
//! Point-to-point path loss predictions through the NTIA Irregular Terrain
//! Model (ITM, also known as Longley-Rice).
//!
//! The model itself ships as a native shared library which is loaded at
//! runtime with `libloading`. [`Itm`] wraps its `ITM_P2P_TLS` entry point
//! behind the [`PropagationModel`] trait, so callers can substitute another
//! implementation (or a test double).
//!
//! ## Example
//!
//! ```no_run
//! use radiokit_itm::{Itm, P2pParams, PropagationModel, TerrainProfile};
//!
//! let itm = Itm::new()?;
//! let profile = TerrainProfile::from_path(10_000.0, &[120.0, 135.0, 150.0, 128.0, 110.0])?;
//! let result = itm.p2p_tls(&P2pParams::default(), &profile.to_pfl()?)?;
//! println!("{:.1} dB ({} warnings)", result.loss_db, result.warnings.len());
//! # Ok::<(), radiokit_itm::ItmError>(())
//! ```

mod error;
mod ffi;
mod types;

pub use error::{ItmError, ItmInput, ItmResult};
pub use types::{
    ground_constants, refractivity, validate_pfl, Climate, ItmWarnings, ModeOfVariability, P2pParams,
    Polarization, PropagationResult, TerrainProfile,
};

use std::os::raw::c_long;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the ITM library location.
pub const ITM_LIBRARY_ENV: &str = "RADIOKIT_ITM_LIB";

/// Platform file name of the ITM shared library.
#[cfg(target_os = "windows")]
pub const DEFAULT_LIBRARY_NAME: &str = "itm.dll";
/// Platform file name of the ITM shared library.
#[cfg(target_os = "macos")]
pub const DEFAULT_LIBRARY_NAME: &str = "libitm.dylib";
/// Platform file name of the ITM shared library.
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const DEFAULT_LIBRARY_NAME: &str = "libitm.so";

/// A terrain-aware path loss model.
pub trait PropagationModel {
    /// Point-to-point prediction with time/location/situation variability.
    ///
    /// `pfl` is a terrain profile in ITM layout (see [`TerrainProfile`]).
    fn p2p_tls(&self, params: &P2pParams, pfl: &[f64]) -> ItmResult<PropagationResult>;
}

/// The ITM shared library, loaded once.
pub struct Itm {
    // Keeps the function pointer below valid
    _library: libloading::Library,
    p2p_tls: ffi::FnItmP2pTls,
    path: PathBuf,
}

impl std::fmt::Debug for Itm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Itm").field("path", &self.path).finish()
    }
}

impl Itm {
    /// Load the library from `RADIOKIT_ITM_LIB`, or the platform default name.
    pub fn new() -> ItmResult<Self> {
        let path = std::env::var_os(ITM_LIBRARY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIBRARY_NAME));
        Self::from_path(path)
    }

    /// Load the library from an explicit path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ItmResult<Self> {
        let path = path.as_ref().to_path_buf();

        // A bare file name is resolved by the system loader
        if path.components().count() > 1 && !path.exists() {
            return Err(ItmError::LibraryNotFound(path.display().to_string()));
        }

        // SAFETY: loading runs the library's initialisers; ITM has none with side effects
        let library = unsafe { libloading::Library::new(&path) }
            .map_err(|e| ItmError::LoadError(format!("{}: {}", path.display(), e)))?;

        // SAFETY: the symbol type matches the exported C signature
        let p2p_tls = unsafe {
            *library
                .get::<ffi::FnItmP2pTls>(ffi::ITM_P2P_TLS_SYMBOL)
                .map_err(|e| ItmError::SymbolNotFound(format!("ITM_P2P_TLS: {}", e)))?
        };

        debug!(path = %path.display(), "loaded ITM library");
        Ok(Self {
            _library: library,
            p2p_tls,
            path,
        })
    }

    /// Location the library was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PropagationModel for Itm {
    fn p2p_tls(&self, params: &P2pParams, pfl: &[f64]) -> ItmResult<PropagationResult> {
        params.validate()?;
        validate_pfl(pfl)?;

        let mut loss_db = 0.0;
        let mut warnings: c_long = 0;

        // SAFETY: pfl holds pfl[0] + 3 elements (checked above) and the out
        // pointers reference live locals
        let code = unsafe {
            (self.p2p_tls)(
                params.h_tx_m,
                params.h_rx_m,
                pfl.as_ptr(),
                params.climate.code(),
                params.n_0,
                params.freq_mhz,
                params.polarization.code(),
                params.epsilon,
                params.sigma,
                params.mdvar.into(),
                params.time_pct,
                params.location_pct,
                params.situation_pct,
                &mut loss_db,
                &mut warnings,
            )
        };

        if code >= 1000 {
            return Err(ItmError::from_code(code));
        }

        let warnings = ItmWarnings::from_bits(warnings);
        debug!(code, loss_db, warnings = warnings.bits(), "ITM_P2P_TLS");
        Ok(PropagationResult {
            status_code: code,
            loss_db,
            warnings: warnings.messages(),
        })
    }
}

impl<M: PropagationModel + ?Sized> PropagationModel for &M {
    fn p2p_tls(&self, params: &P2pParams, pfl: &[f64]) -> ItmResult<PropagationResult> {
        (**self).p2p_tls(params, pfl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_path() {
        let err = Itm::from_path("/nonexistent/dir/libitm.so").unwrap_err();
        assert!(matches!(err, ItmError::LibraryNotFound(_)));
    }

    #[test]
    fn test_unloadable_library_name() {
        let err = Itm::from_path("radiokit-no-such-itm-library.so").unwrap_err();
        assert!(matches!(err, ItmError::LoadError(_)));
    }

    struct FlatLoss(f64);

    impl PropagationModel for FlatLoss {
        fn p2p_tls(&self, params: &P2pParams, pfl: &[f64]) -> ItmResult<PropagationResult> {
            params.validate()?;
            validate_pfl(pfl)?;
            Ok(PropagationResult {
                status_code: 0,
                loss_db: self.0 + pfl[0],
                warnings: Vec::new(),
            })
        }
    }

    #[test]
    fn test_model_through_reference() {
        fn run(model: impl PropagationModel) -> f64 {
            let pfl = TerrainProfile::from_path(100.0, &[1.0, 2.0, 3.0]).unwrap().to_pfl().unwrap();
            model.p2p_tls(&P2pParams::default(), &pfl).unwrap().loss_db
        }
        let model = FlatLoss(100.0);
        assert_eq!(run(&model), 102.0);
        assert_eq!(run(&model as &dyn PropagationModel), 102.0);
    }
}

//! Raw signature of the ITM library entry point.

use std::os::raw::c_long;

/// Null-terminated export name of the point-to-point TLS prediction.
pub const ITM_P2P_TLS_SYMBOL: &[u8] = b"ITM_P2P_TLS\0";

/// `ITM_P2P_TLS`: point-to-point mode with time, location and situation
/// variability.
///
/// Writes the basic transmission loss (dB) and the warning bitmask through
/// the two out pointers. Returns 0, 1 when warnings were raised, or an error
/// code of 1000 and above.
pub type FnItmP2pTls = unsafe extern "C" fn(
    h_tx_m: f64,
    h_rx_m: f64,
    pfl: *const f64,
    climate: i32,
    n_0: f64,
    freq_mhz: f64,
    polarization: i32,
    epsilon: f64,
    sigma: f64,
    mdvar: i32,
    time_pct: f64,
    location_pct: f64,
    situation_pct: f64,
    loss_db: *mut f64,
    warnings: *mut c_long,
) -> i32;

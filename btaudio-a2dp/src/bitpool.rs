//! Bit-pool negotiation.
//!
//! The peer advertises an acceptable bit-pool range; the encoder wants the
//! largest pool a target bit rate affords. The loop here brackets the
//! target rate: stepping down while the estimated pool overshoots the
//! peer's maximum, up while it undershoots the minimum. Having moved in
//! both directions means no rate satisfies the range; the last candidate
//! is committed anyway and the stream keeps running.

use crate::config::SbcConfig;
use crate::rate;
use tracing::{debug, error, warn};

/// Bit-rate adjustment step while searching, in kbit/s.
pub const BITRATE_STEP_KBPS: u16 = 5;

const PROTECT_DECREASED: u8 = 0b01;
const PROTECT_INCREASED: u8 = 0b10;
const PROTECT_BOTH: u8 = PROTECT_DECREASED | PROTECT_INCREASED;

/// Outcome of one negotiation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiation {
    /// The committed bit-pool: the last candidate, even on abort.
    pub bit_pool: u8,
    /// The bit rate the search ended on, in kbit/s.
    pub bit_rate_kbps: u16,
    /// True when the search walked both directions without landing inside
    /// the peer's range.
    pub aborted: bool,
}

/// Search for a bit-pool inside `[min_bit_pool, max_bit_pool]` starting
/// from `start_rate_kbps`.
pub fn negotiate(
    cfg: &SbcConfig,
    sampling_hz: u32,
    start_rate_kbps: u16,
    min_bit_pool: u8,
    max_bit_pool: u8,
) -> Negotiation {
    let mut rate_kbps = start_rate_kbps;
    let mut protect = 0u8;
    let mut bit_pool = 0i32;
    let mut aborted = false;

    loop {
        bit_pool = rate::estimate_bit_pool(cfg, rate_kbps, sampling_hz);
        debug!(candidate = bit_pool, rate_kbps, "bit-pool candidate");

        if bit_pool > i32::from(max_bit_pool) {
            debug!(bit_pool, max = max_bit_pool, "computed bit-pool too large");
            rate_kbps = rate_kbps.wrapping_sub(BITRATE_STEP_KBPS);
            protect |= PROTECT_DECREASED;
        } else if bit_pool < i32::from(min_bit_pool) {
            warn!(bit_pool, min = min_bit_pool, "computed bit-pool too small");
            let previous = rate_kbps;
            rate_kbps = rate_kbps.wrapping_add(BITRATE_STEP_KBPS);
            protect |= PROTECT_INCREASED;
            if rate_kbps < previous {
                // Bit-rate counter overflowed; abort below.
                protect |= PROTECT_BOTH;
            }
        } else {
            break;
        }

        if protect == PROTECT_BOTH {
            error!(
                min = min_bit_pool,
                max = max_bit_pool,
                "could not find bit-pool in range"
            );
            aborted = true;
            break;
        }
    }

    Negotiation {
        bit_pool: bit_pool.clamp(0, 255) as u8,
        bit_rate_kbps: rate_kbps,
        aborted,
    }
}

//! The SBC codec seam.
//!
//! The session drives an external SBC implementation one frame at a time;
//! anything that can turn a frame slab of PCM into SBC bytes plugs in
//! here.

use crate::config::SbcConfig;

/// One-frame SBC encode primitive.
pub trait SbcEncoder {
    /// Re-seed the codec with a new configuration. Called whenever the
    /// session (re)negotiates parameters; implementations must derive all
    /// internal state from `config`, including the bit-pool.
    fn configure(&mut self, config: &SbcConfig);

    /// Encode exactly one SBC frame.
    ///
    /// `pcm` is one frame slab of codec-rate PCM: little-endian signed
    /// 16-bit samples interleaved across the configured channels,
    /// `blocks x sub_bands` samples per channel. The encoded frame is
    /// appended to `out`; the return value is its length in bytes.
    fn encode_frame(&mut self, pcm: &[u8], out: &mut Vec<u8>) -> usize;
}

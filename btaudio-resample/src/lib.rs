//! # btaudio-resample
//!
//! Fixed-ratio PCM upsampling for Bluetooth audio streaming.
//!
//! The A2DP source path only ever converts between the enumerated PCM
//! source rates and the two SBC codec rates (44100 / 48000 Hz), always
//! upward, always ending in stereo 16-bit output. This crate provides the
//! one collaborator that feeding path needs: a byte-oriented, integer
//! phase-accumulator upsampler that reports how much input it consumed and
//! how much output it produced per pass.
//!
//! ## Example
//!
//! ```
//! use btaudio_resample::{Upsampler, UpsamplerConfig};
//!
//! let mut up = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
//! let src = [0u8; 32];            // 16 mono s16le samples
//! let mut dst = [0u8; 256];
//! let run = up.process(&src, &mut dst).unwrap();
//! assert_eq!(run.dst_used, 16 * 3 * 4); // three stereo frames per input sample
//! ```

#![warn(missing_docs)]

pub mod error;
mod upsampler;

pub use error::{ResampleError, Result};
pub use upsampler::{UpsampleRun, Upsampler, UpsamplerConfig};

//! Fixed-ratio integer PCM upsampler.
//!
//! Converts 16-bit interleaved PCM from an enumerated source rate up to a
//! codec rate, always producing interleaved stereo 16-bit output. Mono
//! input is duplicated into both output channels. The conversion uses an
//! integer phase accumulator with linear interpolation between adjacent
//! source frames; the fractional position is carried across calls so
//! consecutive reads stay phase-continuous.

use crate::error::{ResampleError, Result};
use tracing::trace;

/// Bytes per output frame: stereo, 16-bit.
const DST_FRAME_BYTES: usize = 4;

/// Upsampler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsamplerConfig {
    /// Source sample rate in Hz.
    pub src_rate: u32,
    /// Destination (codec) sample rate in Hz.
    pub dst_rate: u32,
    /// Source sample width in bits; only 16 is supported.
    pub bits_per_sample: u8,
    /// Source channel count (1 or 2).
    pub channels: u8,
}

impl UpsamplerConfig {
    /// Create a new configuration.
    pub fn new(src_rate: u32, dst_rate: u32, bits_per_sample: u8, channels: u8) -> Self {
        Self {
            src_rate,
            dst_rate,
            bits_per_sample,
            channels,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.src_rate == 0 {
            return Err(ResampleError::InvalidSampleRate {
                rate: self.src_rate,
            });
        }
        if self.dst_rate == 0 {
            return Err(ResampleError::InvalidSampleRate {
                rate: self.dst_rate,
            });
        }
        if self.bits_per_sample != 16 {
            return Err(ResampleError::UnsupportedBitDepth {
                bits: self.bits_per_sample,
            });
        }
        if self.channels != 1 && self.channels != 2 {
            return Err(ResampleError::InvalidChannelCount {
                count: self.channels,
            });
        }
        Ok(())
    }

    /// Source frame size in bytes.
    fn src_frame_bytes(&self) -> usize {
        usize::from(self.channels) * 2
    }
}

/// Outcome of one upsampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsampleRun {
    /// Source bytes consumed.
    pub src_used: usize,
    /// Destination bytes produced.
    pub dst_used: usize,
}

/// Fixed-ratio PCM upsampler.
#[derive(Debug, Clone)]
pub struct Upsampler {
    config: UpsamplerConfig,
    /// Fractional position between `prev` and the next source frame, in
    /// units of 1/dst_rate. Always `< dst_rate` between calls.
    phase: u32,
    /// Most recently consumed source frame, one sample per output channel.
    prev: [i16; 2],
}

impl Upsampler {
    /// Create a new upsampler.
    pub fn new(config: UpsamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            phase: 0,
            prev: [0; 2],
        })
    }

    /// Re-seed the upsampler with the given configuration.
    ///
    /// Interpolation state is preserved when the configuration is
    /// unchanged, so per-read reconfiguration stays phase-continuous;
    /// a genuine rate or layout change resets it.
    pub fn reconfigure(&mut self, config: UpsamplerConfig) -> Result<()> {
        config.validate()?;
        if config != self.config {
            trace!(
                src_rate = config.src_rate,
                dst_rate = config.dst_rate,
                channels = config.channels,
                "upsampler reconfigured"
            );
            self.config = config;
            self.reset();
        }
        Ok(())
    }

    /// The active configuration.
    pub fn config(&self) -> &UpsamplerConfig {
        &self.config
    }

    /// Conversion ratio (`dst_rate / src_rate`).
    pub fn ratio(&self) -> f64 {
        f64::from(self.config.dst_rate) / f64::from(self.config.src_rate)
    }

    /// Clear the interpolation state.
    pub fn reset(&mut self) {
        self.phase = 0;
        self.prev = [0; 2];
    }

    /// Upsample `src` into `dst`.
    ///
    /// `src` must hold whole source frames of little-endian signed 16-bit
    /// interleaved PCM. Output is interleaved stereo s16le. The pass stops
    /// when either the input is consumed or the output buffer is full, and
    /// reports how many bytes of each were used.
    pub fn process(&mut self, src: &[u8], dst: &mut [u8]) -> Result<UpsampleRun> {
        let src_frame = self.config.src_frame_bytes();
        if src.len() % src_frame != 0 {
            return Err(ResampleError::InputNotFrameAligned {
                actual: src.len(),
                frame: src_frame,
            });
        }

        let n_src = src.len() / src_frame;
        let dst_rate = self.config.dst_rate;
        let src_rate = self.config.src_rate;

        let mut src_idx = 0usize;
        let mut dst_used = 0usize;

        while src_idx < n_src && dst_used + DST_FRAME_BYTES <= dst.len() {
            let cur = self.source_frame(src, src_idx);

            let left = Self::interpolate(self.prev[0], cur[0], self.phase, dst_rate);
            let right = Self::interpolate(self.prev[1], cur[1], self.phase, dst_rate);
            dst[dst_used..dst_used + 2].copy_from_slice(&left.to_le_bytes());
            dst[dst_used + 2..dst_used + 4].copy_from_slice(&right.to_le_bytes());
            dst_used += DST_FRAME_BYTES;

            self.phase += src_rate;
            while self.phase >= dst_rate && src_idx < n_src {
                self.phase -= dst_rate;
                self.prev = self.source_frame(src, src_idx);
                src_idx += 1;
            }
        }

        Ok(UpsampleRun {
            src_used: src_idx * src_frame,
            dst_used,
        })
    }

    /// Read the source frame at `idx` as a stereo pair.
    fn source_frame(&self, src: &[u8], idx: usize) -> [i16; 2] {
        let base = idx * self.config.src_frame_bytes();
        let left = i16::from_le_bytes([src[base], src[base + 1]]);
        if self.config.channels == 1 {
            [left, left]
        } else {
            let right = i16::from_le_bytes([src[base + 2], src[base + 3]]);
            [left, right]
        }
    }

    /// Linear interpolation between `a` and `b` at `phase / dst_rate`.
    #[inline]
    fn interpolate(a: i16, b: i16, phase: u32, dst_rate: u32) -> i16 {
        let delta = i64::from(b) - i64::from(a);
        let value = i64::from(a) + delta * i64::from(phase) / i64::from(dst_rate);
        value as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s16le(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_invalid_config() {
        assert!(Upsampler::new(UpsamplerConfig::new(0, 48000, 16, 1)).is_err());
        assert!(Upsampler::new(UpsamplerConfig::new(16000, 0, 16, 1)).is_err());
        assert!(Upsampler::new(UpsamplerConfig::new(16000, 48000, 8, 1)).is_err());
        assert!(Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 3)).is_err());
    }

    #[test]
    fn test_triple_rate_mono() {
        let mut up = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        let src = s16le(&[300, 600, 900, 1200]);
        let mut dst = [0u8; 64];
        let run = up.process(&src, &mut dst).unwrap();

        // Three stereo output frames per consumed source frame.
        assert_eq!(run.src_used, src.len());
        assert_eq!(run.dst_used, 4 * 3 * DST_FRAME_BYTES);
    }

    #[test]
    fn test_mono_duplicated_to_stereo() {
        let mut up = Upsampler::new(UpsamplerConfig::new(48000, 48000, 16, 1)).unwrap();
        let src = s16le(&[1000, -1000]);
        let mut dst = [0u8; 16];
        let run = up.process(&src, &mut dst).unwrap();

        assert_eq!(run.dst_used, 2 * DST_FRAME_BYTES);
        let left = i16::from_le_bytes([dst[0], dst[1]]);
        let right = i16::from_le_bytes([dst[2], dst[3]]);
        assert_eq!(left, right);
    }

    #[test]
    fn test_interpolated_values_bounded() {
        let mut up = Upsampler::new(UpsamplerConfig::new(22050, 44100, 16, 2)).unwrap();
        let src = s16le(&[0, 0, 1000, -1000, 2000, -2000]);
        let mut dst = [0u8; 128];
        let run = up.process(&src, &mut dst).unwrap();

        for frame in dst[..run.dst_used].chunks_exact(2) {
            let s = i16::from_le_bytes([frame[0], frame[1]]);
            assert!((-2000..=2000).contains(&s));
        }
    }

    #[test]
    fn test_output_buffer_limit() {
        let mut up = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        let src = s16le(&[100; 32]);
        let mut dst = [0u8; 10];
        let run = up.process(&src, &mut dst).unwrap();

        // Only two whole stereo frames fit.
        assert_eq!(run.dst_used, 8);
        assert!(run.src_used < src.len());
    }

    #[test]
    fn test_phase_continuity_across_calls() {
        let mut continuous = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        let src = s16le(&[0, 300, 600, 900, 1200, 1500]);
        let mut dst_whole = [0u8; 128];
        let whole = continuous.process(&src, &mut dst_whole).unwrap();

        let mut split = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        let mut dst_a = [0u8; 128];
        let mut dst_b = [0u8; 128];
        let a = split.process(&src[..6], &mut dst_a).unwrap();
        let b = split.process(&src[6..], &mut dst_b).unwrap();

        assert_eq!(whole.dst_used, a.dst_used + b.dst_used);
        let mut joined = dst_a[..a.dst_used].to_vec();
        joined.extend_from_slice(&dst_b[..b.dst_used]);
        assert_eq!(&dst_whole[..whole.dst_used], &joined[..]);
    }

    #[test]
    fn test_misaligned_input_rejected() {
        let mut up = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 2)).unwrap();
        let mut dst = [0u8; 16];
        assert!(up.process(&[0u8; 5], &mut dst).is_err());
    }

    #[test]
    fn test_reconfigure_same_keeps_state() {
        let mut up = Upsampler::new(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        let src = s16le(&[500; 7]);
        let mut dst = [0u8; 128];
        up.process(&src, &mut dst).unwrap();
        let phase_before = up.phase;
        let prev_before = up.prev;

        up.reconfigure(UpsamplerConfig::new(16000, 48000, 16, 1)).unwrap();
        assert_eq!(up.phase, phase_before);
        assert_eq!(up.prev, prev_before);

        up.reconfigure(UpsamplerConfig::new(32000, 48000, 16, 1)).unwrap();
        assert_eq!(up.phase, 0);
        assert_eq!(up.prev, [0; 2]);
    }
}

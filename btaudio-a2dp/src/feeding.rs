//! PCM feeding buffer.
//!
//! Sits between the source read callback and the SBC codec: each call
//! produces exactly one SBC frame's worth of codec-rate PCM, or reports
//! starvation and remembers how far it got. When the source rate differs
//! from the codec rate the data is pulled through the upsampler and
//! reassembled here until a full frame slab is available.

use crate::config::{FeedingConfig, SbcConfig};
use crate::error::Result;
use btaudio_core::PcmSource;
use btaudio_resample::{Upsampler, UpsamplerConfig};
use tracing::{error, warn};

/// Outcome of one frame-read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    /// The slab holds one full frame of codec-rate PCM.
    Ready,
    /// Not enough PCM was available; partial progress is retained.
    Starved,
}

/// Fractional-read schedule for source rates whose per-frame sample count
/// does not divide evenly: over a 3-read cycle, reads at positions up to
/// `threshold` take one extra sample.
#[derive(Debug, Clone, Copy)]
struct FractSchedule {
    max: u32,
    threshold: u32,
}

fn fract_schedule(src_rate: u32) -> Option<FractSchedule> {
    match src_rate {
        // e.g. 128 * 32000 / 48000 = 85.33: read 86, 85, 85.
        8000 | 32000 => Some(FractSchedule { max: 2, threshold: 0 }),
        // 128 * 16000 / 48000 = 42.67: read 43, 43, 42.
        16000 => Some(FractSchedule { max: 2, threshold: 1 }),
        _ => None,
    }
}

/// Reassembles source PCM into codec-rate frame slabs.
#[derive(Debug)]
pub struct FeedingBuffer {
    feeding: FeedingConfig,
    upsampler: Upsampler,
    /// Scratch buffer for raw source reads on the resampling path.
    read_buf: Vec<u8>,
    /// Up-sampled codec-rate bytes waiting to complete a frame slab.
    reassembly: Vec<u8>,
    /// Bytes of partial progress: slab bytes on the fast path, reassembly
    /// bytes on the resampling path. Always less than one frame slab.
    residue: usize,
    /// Cycle position within the fractional-read schedule.
    fract_counter: u32,
}

impl FeedingBuffer {
    /// Create a feeding buffer for the given source and codec
    /// configuration. Buffers are sized from the active configuration.
    pub fn new(feeding: FeedingConfig, cfg: &SbcConfig) -> Result<Self> {
        let slab = cfg.frame_slab_bytes();
        let upsampler = Upsampler::new(UpsamplerConfig::new(
            feeding.sampling_rate,
            cfg.sampling_rate.hz(),
            feeding.bits_per_sample,
            feeding.channels,
        ))?;
        Ok(Self {
            feeding,
            upsampler,
            read_buf: vec![0; slab + 8],
            reassembly: vec![0; slab * 4],
            residue: 0,
            fract_counter: 0,
        })
    }

    /// Bytes of partial progress held for the next attempt.
    pub fn residue(&self) -> usize {
        self.residue
    }

    /// Zero the entire feeding state.
    pub fn reset(&mut self) {
        self.residue = 0;
        self.fract_counter = 0;
        self.upsampler.reset();
    }

    /// Drop buffered progress but keep the fractional-read cycle position.
    pub fn flush_residue(&mut self) {
        self.residue = 0;
    }

    /// Fill `slab` with exactly one SBC frame of codec-rate PCM.
    ///
    /// `slab` must be sized to `cfg.frame_slab_bytes()`. On
    /// [`FeedStatus::Starved`] the partial progress is retained and the
    /// next call resumes from it.
    pub fn read_one_frame(
        &mut self,
        cfg: &SbcConfig,
        source: &mut dyn PcmSource,
        slab: &mut [u8],
    ) -> FeedStatus {
        let bytes_needed = slab.len();
        let codec_hz = cfg.sampling_rate.hz();

        // Fast path: source already runs at the codec rate.
        if self.feeding.sampling_rate == codec_hz {
            let want = bytes_needed - self.residue;
            let got = source.read(&mut slab[self.residue..]);
            if got != want {
                self.residue += got;
                return FeedStatus::Starved;
            }
            self.residue = 0;
            return FeedStatus::Ready;
        }

        // Resampling path: read source-rate samples, upsample into the
        // reassembly buffer, and hand out whole slabs.
        let mut src_samples =
            cfg.samples_per_frame() * self.feeding.sampling_rate / codec_hz;
        if let Some(schedule) = fract_schedule(self.feeding.sampling_rate) {
            if self.fract_counter <= schedule.threshold {
                src_samples += 1;
            }
            self.fract_counter += 1;
            if self.fract_counter > schedule.max {
                self.fract_counter = 0;
            }
        }

        let read_size = src_samples as usize
            * usize::from(self.feeding.channels)
            * self.feeding.bytes_per_sample() as usize;
        let read_buf = &mut self.read_buf[..read_size];
        let got = source.read(read_buf);
        if got == 0 {
            return FeedStatus::Starved;
        }
        if got < read_size {
            // Pad the tail with silence so a whole read's worth goes
            // through the upsampler.
            warn!(got, read_size, "short PCM read, padding with silence");
            read_buf[got..].fill(0);
        }

        if let Err(err) = self.upsampler.reconfigure(UpsamplerConfig::new(
            self.feeding.sampling_rate,
            codec_hz,
            self.feeding.bits_per_sample,
            self.feeding.channels,
        )) {
            error!(%err, "upsampler rejected feeding configuration");
            return FeedStatus::Starved;
        }

        let run = match self
            .upsampler
            .process(&self.read_buf[..read_size], &mut self.reassembly[self.residue..])
        {
            Ok(run) => run,
            Err(err) => {
                error!(%err, "upsampling failed");
                return FeedStatus::Starved;
            }
        };
        self.residue += run.dst_used;
        debug_assert!(self.residue <= self.reassembly.len());

        if self.residue < bytes_needed {
            return FeedStatus::Starved;
        }

        slab.copy_from_slice(&self.reassembly[..bytes_needed]);
        self.reassembly.copy_within(bytes_needed..self.residue, 0);
        self.residue -= bytes_needed;
        FeedStatus::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source producing an endless ramp, optionally rationed per call.
    struct RampSource {
        next: u8,
        max_per_call: usize,
    }

    impl RampSource {
        fn endless() -> Self {
            Self {
                next: 1,
                max_per_call: usize::MAX,
            }
        }

        fn rationed(max_per_call: usize) -> Self {
            Self {
                next: 1,
                max_per_call,
            }
        }
    }

    impl PcmSource for RampSource {
        fn read(&mut self, dst: &mut [u8]) -> usize {
            let n = dst.len().min(self.max_per_call);
            for b in dst[..n].iter_mut() {
                *b = self.next;
                self.next = self.next.wrapping_add(1).max(1);
            }
            n
        }
    }

    fn cfg_48k() -> SbcConfig {
        SbcConfig {
            sampling_rate: crate::config::SamplingRate::Hz48000,
            ..SbcConfig::high_quality()
        }
    }

    #[test]
    fn test_fast_path_full_read() {
        let feeding = FeedingConfig::new(48000, 16, 2);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut source = RampSource::endless();
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Ready
        );
        assert_eq!(buffer.residue(), 0);
        assert!(slab.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_fast_path_short_read_accumulates_residue() {
        let feeding = FeedingConfig::new(48000, 16, 2);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut source = RampSource::rationed(100);
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Starved
        );
        assert_eq!(buffer.residue(), 100);

        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Starved
        );
        assert_eq!(buffer.residue(), 200);
    }

    #[test]
    fn test_fast_path_resumes_after_starvation() {
        let feeding = FeedingConfig::new(48000, 16, 2);
        let cfg = cfg_48k();
        let slab_len = cfg.frame_slab_bytes();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut slab = vec![0u8; slab_len];

        let mut source = RampSource::rationed(slab_len - 64);
        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Starved
        );
        // The remainder fits in one more read.
        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Ready
        );
        assert_eq!(buffer.residue(), 0);
    }

    #[test]
    fn test_resample_path_produces_frames() {
        let feeding = FeedingConfig::new(16000, 16, 1);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut source = RampSource::endless();
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        // 43 source samples upsample to 129 stereo frames = 516 bytes,
        // already more than the 512-byte slab.
        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Ready
        );
        assert_eq!(buffer.residue(), 4);
    }

    #[test]
    fn test_resample_path_starves_on_empty_source() {
        let feeding = FeedingConfig::new(16000, 16, 1);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut source = |_dst: &mut [u8]| 0usize;
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        assert_eq!(
            buffer.read_one_frame(&cfg, &mut source, &mut slab),
            FeedStatus::Starved
        );
        assert_eq!(buffer.residue(), 0);
    }

    #[test]
    fn test_fractional_schedule_cycles() {
        // 32 kHz: 128 * 32000 / 48000 = 85.33, so reads go 86, 85, 85
        // samples and repeat.
        let feeding = FeedingConfig::new(32000, 16, 1);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        let mut sizes = Vec::new();
        {
            let mut source = |dst: &mut [u8]| {
                sizes.push(dst.len());
                dst.fill(0);
                dst.len()
            };
            for _ in 0..6 {
                buffer.read_one_frame(&cfg, &mut source, &mut slab);
            }
        }
        assert_eq!(sizes, vec![172, 170, 170, 172, 170, 170]);
    }

    #[test]
    fn test_flush_keeps_fract_cycle() {
        let feeding = FeedingConfig::new(16000, 16, 1);
        let cfg = cfg_48k();
        let mut buffer = FeedingBuffer::new(feeding, &cfg).unwrap();
        let mut source = RampSource::endless();
        let mut slab = vec![0u8; cfg.frame_slab_bytes()];

        buffer.read_one_frame(&cfg, &mut source, &mut slab);
        let cycle = buffer.fract_counter;
        buffer.flush_residue();
        assert_eq!(buffer.residue(), 0);
        assert_eq!(buffer.fract_counter, cycle);

        buffer.reset();
        assert_eq!(buffer.fract_counter, 0);
    }
}

//! Pure rate arithmetic for the SBC streaming path.
//!
//! Everything here is stateless: frame length per the A2DP/SBC spec
//! (v1.3, 12.4), bit-pool estimation at a target bit rate, PCM byte
//! budgets, and the per-packet frame capacity under the MTU and
//! radio-link caps.

use crate::config::{ChannelMode, FeedingConfig, SamplingRate, SbcConfig};
use tracing::{error, warn};

/// High-quality target bit rate at 44.1 kHz, in kbit/s.
pub const SBC_DEFAULT_BITRATE_KBPS: u16 = 328;

/// Bit-rate cap for non-EDR links, in kbit/s.
pub const SBC_NON_EDR_MAX_RATE_KBPS: u16 = 229;

/// 2DH5 payload budget after L2CAP and AVDTP headers:
/// 679 bytes - (4 bytes L2CAP header + 12 bytes AVDTP header).
pub const MAX_2MBPS_AVDTP_MTU: u16 = 663;

/// SBC frame header size in bytes (A2DP spec v1.3, 12.4, Table 12.12).
const SBC_FRAME_HEADER_BYTES: u32 = 4;

/// Scale factor bits per sub-band channel (Table 12.13).
const SBC_SCALE_FACTOR_BITS: u32 = 4;

/// Largest observed high-quality frame length at 44.1 kHz, used as the
/// fallback when a frame length of zero would otherwise divide the MTU.
const MAX_HQ_FRAME_LEN_44100: u32 = 119;

/// Largest observed high-quality frame length at 48 kHz.
const MAX_HQ_FRAME_LEN_48000: u32 = 115;

/// Target source bit rate for the link type, in kbit/s.
pub fn source_rate_kbps(peer_is_edr: bool) -> u16 {
    if peer_is_edr {
        SBC_DEFAULT_BITRATE_KBPS
    } else {
        SBC_NON_EDR_MAX_RATE_KBPS
    }
}

/// SBC frame length in bytes for the given configuration.
pub fn frame_length(cfg: &SbcConfig) -> u32 {
    let ns = u32::from(cfg.sub_bands.count());
    let nb = u32::from(cfg.blocks.count());
    let nc = u32::from(cfg.channel_mode.channel_count());
    let bp = u32::from(cfg.bit_pool);
    let scale_factors = (SBC_SCALE_FACTOR_BITS * ns * nc) / 8;

    match cfg.channel_mode {
        ChannelMode::Mono | ChannelMode::DualChannel => {
            SBC_FRAME_HEADER_BYTES + scale_factors + (nb * nc * bp) / 8
        }
        ChannelMode::Stereo => SBC_FRAME_HEADER_BYTES + scale_factors + (nb * bp) / 8,
        ChannelMode::JointStereo => {
            SBC_FRAME_HEADER_BYTES + scale_factors + (ns + nb * bp) / 8
        }
    }
}

/// Estimate the bit-pool that meets `bit_rate_kbps` at `sampling_hz`.
///
/// Mirrors the codec's own derivation: the stereo-pair modes solve for the
/// shared pool and step back one if the implied rate overshoots; mono and
/// dual channel cap the per-channel pool at `16 x sub_bands`. Never
/// returns a negative pool.
pub fn estimate_bit_pool(cfg: &SbcConfig, bit_rate_kbps: u16, sampling_hz: u32) -> i32 {
    let ns = i32::from(cfg.sub_bands.count());
    let nb = i32::from(cfg.blocks.count());
    let nc = i32::from(cfg.channel_mode.channel_count());
    let rate = i32::from(bit_rate_kbps);
    let fs = sampling_hz as i32;

    let mut bit_pool = if cfg.channel_mode.is_stereo_pair() {
        let joint = cfg.channel_mode.joint_bits(cfg.sub_bands) as i32;
        let mut pool =
            (rate * ns * 1000 / fs) - ((32 + 4 * ns * nc + joint) / nb);

        let frame_len = 4 + (4 * ns * nc) / 8 + (joint + nb * pool) / 8;
        let implied_rate = (8 * frame_len * fs) / (ns * nb * 1000);
        if implied_rate > rate {
            pool -= 1;
        }

        pool.min(cfg.sub_bands.stereo_bit_pool_cap())
    } else {
        let pool = (ns * rate * 1000) / (fs * nc) - ((32 / nc + 4 * ns) / nb);
        pool.min(16 * ns)
    };

    if bit_pool < 0 {
        bit_pool = 0;
    }
    bit_pool
}

/// PCM bytes one SBC frame consumes from the source
/// (`sub_bands x blocks x source channels x bytes per sample`).
pub fn pcm_bytes_per_frame(cfg: &SbcConfig, feeding: &FeedingConfig) -> u32 {
    u32::from(cfg.sub_bands.count())
        * u32::from(cfg.blocks.count())
        * u32::from(feeding.channels)
        * feeding.bytes_per_sample()
}

/// Per-packet frame capacity together with the MTU actually in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketCapacity {
    /// Whole SBC frames that fit in one media payload.
    pub frames: u8,
    /// MTU after the 2 Mbps radio-link clamp, if it applied.
    pub effective_mtu: u16,
}

/// Compute how many SBC frames fit in one AVDTP media payload.
///
/// A peer that is EDR but cannot do 3 Mbps is held to the 2DH5 payload
/// size; the A2DP media payload header (plus the SCMS-T byte when content
/// protection is active) is subtracted before dividing by the frame
/// length.
pub fn max_frames_per_packet(
    cfg: &SbcConfig,
    tx_mtu: u16,
    peer_is_edr: bool,
    peer_supports_3mbps: bool,
    scms_t: bool,
) -> PacketCapacity {
    let mut effective_mtu = tx_mtu;
    if peer_is_edr && !peer_supports_3mbps && effective_mtu > MAX_2MBPS_AVDTP_MTU {
        warn!(
            mtu = tx_mtu,
            clamped = MAX_2MBPS_AVDTP_MTU,
            "peer is EDR without 3 Mbps support, restricting AVDTP MTU"
        );
        effective_mtu = MAX_2MBPS_AVDTP_MTU;
    }

    let header_size = 1 + u16::from(scms_t);
    let budget = u32::from(effective_mtu.saturating_sub(header_size));

    let frames = match cfg.sampling_rate {
        SamplingRate::Hz44100 => {
            let mut frame_len = frame_length(cfg);
            if frame_len == 0 {
                error!(
                    fallback = MAX_HQ_FRAME_LEN_44100,
                    "frame length computed as zero, using 44.1 kHz default"
                );
                frame_len = MAX_HQ_FRAME_LEN_44100;
            }
            budget / frame_len
        }
        SamplingRate::Hz48000 => {
            let mut frame_len = frame_length(cfg);
            if frame_len == 0 {
                error!(
                    fallback = MAX_HQ_FRAME_LEN_48000,
                    "frame length computed as zero, using 48 kHz default"
                );
                frame_len = MAX_HQ_FRAME_LEN_48000;
            }
            budget / frame_len
        }
        _ => {
            error!(
                rate = cfg.sampling_rate.hz(),
                "no packet frame capacity defined for codec rate"
            );
            0
        }
    };

    PacketCapacity {
        frames: u8::try_from(frames).unwrap_or(u8::MAX),
        effective_mtu,
    }
}

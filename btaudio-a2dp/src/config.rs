//! SBC encoder and PCM feeding configuration.
//!
//! The SBC parameter space is small and fully enumerated, so every knob is
//! an explicit variant type with its own value table; none of the codec
//! arithmetic depends on discriminant values.

/// SBC channel mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// Single channel.
    Mono,
    /// Two independently coded channels.
    DualChannel,
    /// Two channels, shared bit-pool.
    Stereo,
    /// Two channels, shared bit-pool plus per-sub-band joint coding bits.
    JointStereo,
}

impl ChannelMode {
    /// Number of PCM channels the codec consumes in this mode.
    pub fn channel_count(self) -> u8 {
        match self {
            ChannelMode::Mono => 1,
            _ => 2,
        }
    }

    /// Whether this mode codes a stereo pair with a shared bit-pool.
    pub fn is_stereo_pair(self) -> bool {
        matches!(self, ChannelMode::Stereo | ChannelMode::JointStereo)
    }

    /// Joint-coding bits spent per frame: one bit per sub-band in joint
    /// stereo, none otherwise.
    pub fn joint_bits(self, sub_bands: SubBands) -> u32 {
        match self {
            ChannelMode::JointStereo => u32::from(sub_bands.count()),
            _ => 0,
        }
    }
}

/// SBC sub-band count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubBands {
    /// 4 sub-bands.
    Four,
    /// 8 sub-bands.
    Eight,
}

impl SubBands {
    /// Numeric sub-band count.
    pub fn count(self) -> u8 {
        match self {
            SubBands::Four => 4,
            SubBands::Eight => 8,
        }
    }

    /// Hard ceiling on the bit-pool for stereo-pair modes at this
    /// sub-band count.
    pub fn stereo_bit_pool_cap(self) -> i32 {
        match self {
            SubBands::Four => 128,
            SubBands::Eight => 255,
        }
    }
}

/// SBC block count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockCount {
    /// 4 blocks.
    Four,
    /// 8 blocks.
    Eight,
    /// 12 blocks.
    Twelve,
    /// 16 blocks.
    Sixteen,
}

impl BlockCount {
    /// Numeric block count.
    pub fn count(self) -> u8 {
        match self {
            BlockCount::Four => 4,
            BlockCount::Eight => 8,
            BlockCount::Twelve => 12,
            BlockCount::Sixteen => 16,
        }
    }
}

/// SBC bit allocation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Allocation {
    /// Signal-to-noise-ratio driven allocation.
    Snr,
    /// Loudness driven allocation.
    Loudness,
}

/// SBC codec sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplingRate {
    /// 16 kHz.
    Hz16000,
    /// 32 kHz.
    Hz32000,
    /// 44.1 kHz.
    Hz44100,
    /// 48 kHz.
    Hz48000,
}

impl SamplingRate {
    /// Rate in Hz.
    pub fn hz(self) -> u32 {
        match self {
            SamplingRate::Hz16000 => 16000,
            SamplingRate::Hz32000 => 32000,
            SamplingRate::Hz44100 => 44100,
            SamplingRate::Hz48000 => 48000,
        }
    }
}

/// Complete SBC encoder configuration for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SbcConfig {
    /// Channel mode.
    pub channel_mode: ChannelMode,
    /// Sub-band count.
    pub sub_bands: SubBands,
    /// Block count.
    pub blocks: BlockCount,
    /// Allocation method.
    pub allocation: Allocation,
    /// Codec sampling rate.
    pub sampling_rate: SamplingRate,
    /// Negotiated bit-pool.
    pub bit_pool: u8,
    /// Target bit rate in kbit/s.
    pub bit_rate_kbps: u16,
}

impl SbcConfig {
    /// High-quality configuration: joint stereo, 8 sub-bands, 16 blocks,
    /// loudness allocation at 44.1 kHz. Bit-pool and bit rate are filled
    /// in by the session.
    pub fn high_quality() -> Self {
        Self {
            channel_mode: ChannelMode::JointStereo,
            sub_bands: SubBands::Eight,
            blocks: BlockCount::Sixteen,
            allocation: Allocation::Loudness,
            sampling_rate: SamplingRate::Hz44100,
            bit_pool: 0,
            bit_rate_kbps: 0,
        }
    }

    /// PCM samples per SBC frame (`blocks x sub_bands`).
    pub fn samples_per_frame(&self) -> u32 {
        u32::from(self.blocks.count()) * u32::from(self.sub_bands.count())
    }

    /// PCM bytes per codec-rate frame slab
    /// (`blocks x sub_bands x channels x 2`).
    pub fn frame_slab_bytes(&self) -> usize {
        self.samples_per_frame() as usize
            * usize::from(self.channel_mode.channel_count())
            * 2
    }
}

impl Default for SbcConfig {
    fn default() -> Self {
        Self::high_quality()
    }
}

/// Description of the upstream PCM producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedingConfig {
    /// Source sample rate in Hz.
    pub sampling_rate: u32,
    /// Source sample width in bits.
    pub bits_per_sample: u8,
    /// Source channel count.
    pub channels: u8,
}

impl FeedingConfig {
    /// Sample rates the feeding path accepts.
    pub const SUPPORTED_RATES: [u32; 9] = [
        8000, 11025, 12000, 16000, 22050, 24000, 32000, 44100, 48000,
    ];

    /// Create a new feeding configuration.
    pub fn new(sampling_rate: u32, bits_per_sample: u8, channels: u8) -> Self {
        Self {
            sampling_rate,
            bits_per_sample,
            channels,
        }
    }

    /// CD-quality source: 44.1 kHz, 16-bit, stereo.
    pub fn cd_quality() -> Self {
        Self::new(44100, 16, 2)
    }

    /// Source frame size in bytes.
    pub fn bytes_per_sample(&self) -> u32 {
        u32::from(self.bits_per_sample) / 8
    }

    /// The codec rate this source rate locks the connection to, if the
    /// rate belongs to one of the two supported families.
    pub fn required_codec_rate(&self) -> Option<SamplingRate> {
        match self.sampling_rate {
            8000 | 12000 | 16000 | 24000 | 32000 | 48000 => Some(SamplingRate::Hz48000),
            11025 | 22050 | 44100 => Some(SamplingRate::Hz44100),
            _ => None,
        }
    }
}

/// Session construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Channel mode to start with.
    pub channel_mode: ChannelMode,
    /// Sub-band count.
    pub sub_bands: SubBands,
    /// Block count.
    pub blocks: BlockCount,
    /// Allocation method.
    pub allocation: Allocation,
    /// Codec sampling rate to start with.
    pub sampling_rate: SamplingRate,
    /// Peer AVDTP MTU in bytes.
    pub peer_mtu: u16,
    /// Whether the peer link is EDR-capable.
    pub peer_is_edr: bool,
    /// Whether the peer supports 3 Mbps EDR packets.
    pub peer_supports_3mbps: bool,
    /// Whether SCMS-T content protection reserves a header byte.
    pub scms_t: bool,
}

impl SessionConfig {
    /// High-quality defaults against the given peer MTU.
    pub fn high_quality(peer_mtu: u16) -> Self {
        Self {
            channel_mode: ChannelMode::JointStereo,
            sub_bands: SubBands::Eight,
            blocks: BlockCount::Sixteen,
            allocation: Allocation::Loudness,
            sampling_rate: SamplingRate::Hz44100,
            peer_mtu,
            peer_is_edr: true,
            peer_supports_3mbps: true,
            scms_t: false,
        }
    }
}

/// Parameters for a codec update after (re)negotiation with the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateParams {
    /// Smallest MTU across the active transport channels.
    pub min_mtu: u16,
    /// Peer's minimum acceptable bit-pool.
    pub min_bit_pool: u8,
    /// Peer's maximum acceptable bit-pool.
    pub max_bit_pool: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_counts() {
        assert_eq!(ChannelMode::Mono.channel_count(), 1);
        assert_eq!(ChannelMode::DualChannel.channel_count(), 2);
        assert_eq!(ChannelMode::Stereo.channel_count(), 2);
        assert_eq!(ChannelMode::JointStereo.channel_count(), 2);
    }

    #[test]
    fn test_joint_bits_table() {
        assert_eq!(ChannelMode::JointStereo.joint_bits(SubBands::Eight), 8);
        assert_eq!(ChannelMode::JointStereo.joint_bits(SubBands::Four), 4);
        assert_eq!(ChannelMode::Stereo.joint_bits(SubBands::Eight), 0);
        assert_eq!(ChannelMode::Mono.joint_bits(SubBands::Eight), 0);
    }

    #[test]
    fn test_frame_slab_bytes() {
        let cfg = SbcConfig::high_quality();
        // 16 blocks x 8 sub-bands x 2 channels x 2 bytes.
        assert_eq!(cfg.frame_slab_bytes(), 512);

        let mono = SbcConfig {
            channel_mode: ChannelMode::Mono,
            ..cfg
        };
        assert_eq!(mono.frame_slab_bytes(), 256);
    }

    #[test]
    fn test_codec_rate_families() {
        assert_eq!(
            FeedingConfig::new(44100, 16, 2).required_codec_rate(),
            Some(SamplingRate::Hz44100)
        );
        assert_eq!(
            FeedingConfig::new(22050, 16, 2).required_codec_rate(),
            Some(SamplingRate::Hz44100)
        );
        assert_eq!(
            FeedingConfig::new(8000, 16, 1).required_codec_rate(),
            Some(SamplingRate::Hz48000)
        );
        assert_eq!(
            FeedingConfig::new(48000, 16, 2).required_codec_rate(),
            Some(SamplingRate::Hz48000)
        );
        assert_eq!(FeedingConfig::new(96000, 16, 2).required_codec_rate(), None);
    }
}

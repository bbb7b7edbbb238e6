//! A2DP SBC streaming session.
//!
//! One session owns the encoder configuration, feeding state, statistics
//! and the three collaborator seams (PCM source, packet sink, SBC codec).
//! Everything runs synchronously on the caller's media task; the periodic
//! [`send_frames`](SbcSession::send_frames) call is the only clock.

use crate::bitpool::{self, Negotiation};
use crate::budget::{self, FrameBudgeter, ENCODER_INTERVAL_MS};
use crate::config::{
    ChannelMode, FeedingConfig, SbcConfig, SessionConfig, UpdateParams,
};
use crate::encoder::SbcEncoder;
use crate::error::{A2dpError, Result};
use crate::feeding::{FeedStatus, FeedingBuffer};
use crate::rate;
use crate::stats::SessionStats;
use btaudio_core::{
    MediaPacket, MediaTimestamp, PacketSink, PcmSource, MAX_MEDIA_PACKET_FRAMES,
};
use std::fmt;
use std::io;
use tracing::{debug, error, trace, warn};

/// Capacity of one media buffer allocation.
const MEDIA_BUFFER_SIZE: usize = 4096;

/// Room reserved at the front of each media buffer for the transport
/// headers below: L2CAP plus the 12-byte AVDTP media header.
const AVDTP_MEDIA_OFFSET: usize = 23;

/// A2DP SBC media payload header length.
const SBC_MPL_HEADER_LEN: usize = 1;

/// Per-buffer bookkeeping reserve subtracted when deriving the MTU floor
/// from the media buffer capacity.
const BUFFER_RESERVE: usize = 8;

/// Per-session feeding state, present once the PCM source is described.
struct FeedingState {
    config: FeedingConfig,
    buffer: FeedingBuffer,
    /// One SBC frame's worth of codec-rate PCM, reused across encodes.
    slab: Vec<u8>,
}

/// An A2DP source-role SBC streaming session.
pub struct SbcSession {
    config: SbcConfig,
    scms_t: bool,
    peer_is_edr: bool,
    peer_supports_3mbps: bool,
    /// Effective transmit MTU after the buffer floor and radio-link caps.
    tx_mtu: u16,
    /// SBC frames per media packet; refreshed on every codec change.
    tx_sbc_frames: u8,
    timestamp: MediaTimestamp,
    budgeter: FrameBudgeter,
    feeding: Option<FeedingState>,
    stats: SessionStats,
    /// Scratch buffer for one encoded SBC frame.
    frame_buf: Vec<u8>,
    source: Box<dyn PcmSource>,
    sink: Box<dyn PacketSink>,
    encoder: Box<dyn SbcEncoder>,
}

impl SbcSession {
    /// Create a session against a configured peer.
    ///
    /// The SBC codec is seeded with the link-appropriate target bit rate
    /// and the derived bit-pool; `now_us` stamps the session start in the
    /// caller's clock domain (the same clock later passed to
    /// [`send_frames`](Self::send_frames)).
    pub fn new(
        session: SessionConfig,
        now_us: u64,
        source: Box<dyn PcmSource>,
        sink: Box<dyn PacketSink>,
        encoder: Box<dyn SbcEncoder>,
    ) -> Result<Self> {
        let header_offset =
            AVDTP_MEDIA_OFFSET + SBC_MPL_HEADER_LEN + usize::from(session.scms_t);
        let a2dp_header = 1 + u16::from(session.scms_t);
        if session.peer_mtu <= a2dp_header {
            return Err(A2dpError::MtuTooSmall {
                mtu: session.peer_mtu,
            });
        }

        let mtu_floor = (MEDIA_BUFFER_SIZE - header_offset - BUFFER_RESERVE) as u16;
        let tx_mtu = session.peer_mtu.min(mtu_floor);
        debug!(
            mtu = tx_mtu,
            peer_mtu = session.peer_mtu,
            "creating SBC session"
        );

        let bit_rate_kbps = rate::source_rate_kbps(session.peer_is_edr);
        let mut config = SbcConfig {
            channel_mode: session.channel_mode,
            sub_bands: session.sub_bands,
            blocks: session.blocks,
            allocation: session.allocation,
            sampling_rate: session.sampling_rate,
            bit_pool: 0,
            bit_rate_kbps,
        };
        config.bit_pool = rate::estimate_bit_pool(
            &config,
            bit_rate_kbps,
            config.sampling_rate.hz(),
        )
        .clamp(0, 255) as u8;

        let mut this = Self {
            config,
            scms_t: session.scms_t,
            peer_is_edr: session.peer_is_edr,
            peer_supports_3mbps: session.peer_supports_3mbps,
            tx_mtu,
            tx_sbc_frames: 0,
            timestamp: MediaTimestamp::ZERO,
            budgeter: FrameBudgeter::new(),
            feeding: None,
            stats: SessionStats::started_at(now_us),
            frame_buf: Vec::with_capacity(256),
            source,
            sink,
            encoder,
        };
        this.encoder.configure(&this.config);
        this.refresh_packet_capacity();
        debug!(bit_pool = this.config.bit_pool, "SBC codec seeded");
        Ok(this)
    }

    /// Apply updated peer constraints: re-derive the transmit MTU, run the
    /// bit-pool negotiation, re-seed the codec and refresh the per-packet
    /// frame capacity. Returns the negotiation outcome.
    pub fn update(&mut self, params: &UpdateParams) -> Negotiation {
        debug!(
            min_mtu = params.min_mtu,
            min_bit_pool = params.min_bit_pool,
            max_bit_pool = params.max_bit_pool,
            "codec update"
        );

        let mtu_floor =
            (MEDIA_BUFFER_SIZE - self.header_offset() - BUFFER_RESERVE) as u16;
        self.tx_mtu = params.min_mtu.min(mtu_floor);

        let start_rate = rate::source_rate_kbps(self.peer_is_edr);
        let outcome = bitpool::negotiate(
            &self.config,
            self.config.sampling_rate.hz(),
            start_rate,
            params.min_bit_pool,
            params.max_bit_pool,
        );
        self.config.bit_pool = outcome.bit_pool;
        self.config.bit_rate_kbps = outcome.bit_rate_kbps;
        debug!(
            bit_rate = outcome.bit_rate_kbps,
            bit_pool = outcome.bit_pool,
            "final bit rate and bit pool"
        );

        self.encoder.configure(&self.config);
        self.refresh_packet_capacity();
        outcome
    }

    /// Describe the upstream PCM producer.
    ///
    /// Source rates lock the codec to their family rate (44.1 kHz for the
    /// 11025/22050/44100 family, 48 kHz otherwise) and a mono codec
    /// configuration is widened to joint stereo, re-seeding the codec when
    /// anything changed.
    pub fn feeding_init(&mut self, feeding: FeedingConfig) -> Result<()> {
        debug!(
            rate = feeding.sampling_rate,
            channels = feeding.channels,
            bits = feeding.bits_per_sample,
            "PCM feeding"
        );

        if feeding.bits_per_sample != 16 {
            return Err(A2dpError::UnsupportedBitDepth {
                bits: feeding.bits_per_sample,
            });
        }
        if feeding.channels != 1 && feeding.channels != 2 {
            return Err(A2dpError::InvalidChannelCount {
                count: feeding.channels,
            });
        }
        if !FeedingConfig::SUPPORTED_RATES.contains(&feeding.sampling_rate) {
            return Err(A2dpError::UnsupportedFeedingRate {
                rate: feeding.sampling_rate,
            });
        }

        let mut reconfig_needed = false;
        if let Some(required) = feeding.required_codec_rate() {
            if self.config.sampling_rate != required {
                debug!(rate = required.hz(), "SBC reconfiguration needed");
                self.config.sampling_rate = required;
                reconfig_needed = true;
            }
        }

        // Some sinks do not accept mono; always stream a stereo pair.
        if self.config.channel_mode == ChannelMode::Mono {
            debug!("SBC reconfiguration needed in stereo");
            self.config.channel_mode = ChannelMode::JointStereo;
            reconfig_needed = true;
        }

        if reconfig_needed {
            self.config.bit_pool = rate::estimate_bit_pool(
                &self.config,
                self.config.bit_rate_kbps,
                self.config.sampling_rate.hz(),
            )
            .clamp(0, 255) as u8;
            self.encoder.configure(&self.config);
        } else {
            debug!("no SBC reconfiguration needed");
        }

        let buffer = FeedingBuffer::new(feeding, &self.config)?;
        let slab = vec![0; self.config.frame_slab_bytes()];
        self.feeding = Some(FeedingState {
            config: feeding,
            buffer,
            slab,
        });
        Ok(())
    }

    /// Zero the feeding state and adopt the source's per-tick byte rate.
    pub fn feeding_reset(&mut self) {
        match &mut self.feeding {
            Some(state) => {
                state.buffer.reset();
                let bytes_per_tick = budget::bytes_per_tick(&state.config);
                self.budgeter.reset(bytes_per_tick);
                debug!(bytes_per_tick, "PCM bytes per tick");
            }
            None => warn!("feeding reset before feeding_init"),
        }
    }

    /// Drop accumulated credit and buffered PCM, keeping the timestamp and
    /// statistics.
    pub fn feeding_flush(&mut self) {
        self.budgeter.flush();
        if let Some(state) = &mut self.feeding {
            state.buffer.flush_residue();
        }
    }

    /// Zero the session back to its just-constructed state: timestamp,
    /// statistics, credit and feeding state are all cleared.
    pub fn cleanup(&mut self) {
        self.timestamp = MediaTimestamp::ZERO;
        self.budgeter = FrameBudgeter::new();
        self.feeding = None;
        self.stats = SessionStats::default();
        self.frame_buf.clear();
    }

    /// The media-task tick interval this session is budgeted for.
    pub fn encoder_interval_ms() -> u64 {
        ENCODER_INTERVAL_MS
    }

    /// Encode and enqueue the frames owed at `now_us`.
    ///
    /// Computes the tick budget, then builds and hands off media packets
    /// until the budget is spent, the PCM source starves, or the sink
    /// pushes back.
    pub fn send_frames(&mut self, now_us: u64) {
        let Some(mut state) = self.feeding.take() else {
            warn!("tick before feeding_init, ignoring");
            return;
        };

        let pcm_bytes_per_frame = rate::pcm_bytes_per_frame(&self.config, &state.config);
        if self.peer_is_edr && self.tx_sbc_frames == 0 {
            error!("frames per packet stale, recomputing");
            self.refresh_packet_capacity();
        }

        let budget = self.budgeter.compute(
            now_us,
            pcm_bytes_per_frame,
            self.peer_is_edr,
            self.tx_sbc_frames,
            &mut self.stats,
        );
        trace!(
            iterations = budget.iterations,
            frames = budget.frames_per_iteration,
            "tick budget"
        );

        if budget.frames_per_iteration > 0 {
            for _ in 0..budget.iterations {
                if !self.encode_packet(
                    &mut state,
                    budget.frames_per_iteration,
                    pcm_bytes_per_frame,
                ) {
                    break;
                }
            }
        }

        self.feeding = Some(state);
    }

    /// Build media packets for one budget iteration.
    ///
    /// Returns `false` when the sink refused a packet and the tick must
    /// stop.
    fn encode_packet(
        &mut self,
        state: &mut FeedingState,
        frames_budgeted: u8,
        pcm_bytes_per_frame: u32,
    ) -> bool {
        let header_offset = self.header_offset();
        let samples_per_frame = self.config.samples_per_frame();
        let mut nb_frame = u16::from(frames_budgeted);
        let mut remaining = nb_frame;

        while nb_frame > 0 {
            let mut packet = MediaPacket::with_offset(MEDIA_BUFFER_SIZE, header_offset);
            let mut last_frame_len = 0usize;

            loop {
                state.slab.fill(0);
                match state.buffer.read_one_frame(
                    &self.config,
                    self.source.as_mut(),
                    &mut state.slab,
                ) {
                    FeedStatus::Ready => {
                        self.frame_buf.clear();
                        last_frame_len =
                            self.encoder.encode_frame(&state.slab, &mut self.frame_buf);
                        packet.append_frame(&self.frame_buf);
                        nb_frame -= 1;
                    }
                    FeedStatus::Starved => {
                        warn!(
                            unfed = nb_frame,
                            residue = state.buffer.residue(),
                            "PCM underflow, returning credit"
                        );
                        self.budgeter
                            .refund(u32::from(nb_frame), pcm_bytes_per_frame);
                        nb_frame = 0;
                    }
                }

                let mtu_room = packet.payload_len() + last_frame_len
                    < usize::from(self.tx_mtu);
                if !(mtu_room
                    && packet.frame_count() < MAX_MEDIA_PACKET_FRAMES
                    && nb_frame > 0)
                {
                    break;
                }
            }

            if !packet.is_empty() {
                // The packet timestamp names its first frame, i.e. the
                // counter value before this packet's samples.
                packet.set_timestamp(self.timestamp);
                packet.seal();
                self.timestamp
                    .advance(u32::from(packet.frame_count()) * samples_per_frame);

                let done = remaining - nb_frame;
                remaining = nb_frame;
                if !self.sink.enqueue(packet, done) {
                    debug!("transport refused packet, stopping tick");
                    return false;
                }
            }
            // An empty packet (starved before the first frame) is simply
            // dropped; nb_frame is zero and the loop exits.
        }
        true
    }

    /// Recompute the per-packet frame capacity, adopting any radio-link
    /// MTU clamp it applied.
    fn refresh_packet_capacity(&mut self) {
        let cap = rate::max_frames_per_packet(
            &self.config,
            self.tx_mtu,
            self.peer_is_edr,
            self.peer_supports_3mbps,
            self.scms_t,
        );
        self.tx_mtu = cap.effective_mtu;
        self.tx_sbc_frames = cap.frames;
    }

    fn header_offset(&self) -> usize {
        AVDTP_MEDIA_OFFSET + SBC_MPL_HEADER_LEN + usize::from(self.scms_t)
    }

    /// Write the cumulative statistics report.
    pub fn debug_dump(&self, out: &mut dyn io::Write) -> io::Result<()> {
        self.stats.write_report(out)
    }

    /// The active SBC configuration.
    pub fn config(&self) -> &SbcConfig {
        &self.config
    }

    /// The effective transmit MTU.
    pub fn tx_mtu(&self) -> u16 {
        self.tx_mtu
    }

    /// SBC frames per media packet at the current configuration.
    pub fn frames_per_packet(&self) -> u8 {
        self.tx_sbc_frames
    }

    /// The media timestamp the next packet will carry.
    pub fn timestamp(&self) -> MediaTimestamp {
        self.timestamp
    }

    /// Cumulative scheduling statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Outstanding PCM byte credit.
    pub fn pcm_credit(&self) -> u32 {
        self.budgeter.counter()
    }

    /// Bytes of partial PCM progress held by the feeding buffer.
    pub fn feeding_residue(&self) -> usize {
        self.feeding.as_ref().map_or(0, |state| state.buffer.residue())
    }
}

impl fmt::Debug for SbcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SbcSession")
            .field("config", &self.config)
            .field("tx_mtu", &self.tx_mtu)
            .field("tx_sbc_frames", &self.tx_sbc_frames)
            .field("timestamp", &self.timestamp)
            .field("peer_is_edr", &self.peer_is_edr)
            .finish()
    }
}

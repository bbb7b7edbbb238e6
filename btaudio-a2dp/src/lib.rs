//! # btaudio-a2dp
//!
//! The A2DP source-role SBC encoder feeder and packetizer: the real-time
//! driver between a PCM producer and an AVDTP media transport.
//!
//! A periodic tick calls [`SbcSession::send_frames`]; the session turns
//! elapsed wall-clock time into a frame budget, pulls PCM through the
//! feeding buffer (upsampling when the source rate differs from the
//! negotiated codec rate), drives the SBC codec one frame at a time and
//! packs the encoded frames into MTU-bounded media packets for the
//! transport's enqueue callback.
//!
//! ## Structure
//!
//! - [`config`]: SBC parameter enums and session/feeding configuration
//! - [`rate`]: pure rate arithmetic (frame length, bit-pool estimation,
//!   per-packet frame capacity)
//! - [`bitpool`]: the bit-pool negotiation loop
//! - [`feeding`]: PCM reassembly and the upsampling path
//! - [`budget`]: per-tick frame budgeting and credit accounting
//! - [`session`]: lifecycle and the packetizer
//!
//! The SBC codec itself is a collaborator behind [`SbcEncoder`]; the PCM
//! source and the transport plug in through the callback traits in
//! `btaudio-core`.
//!
//! ## Example
//!
//! ```
//! use btaudio_a2dp::{SbcEncoder, SbcSession, SbcConfig, SessionConfig, FeedingConfig};
//!
//! struct NullSbc;
//! impl SbcEncoder for NullSbc {
//!     fn configure(&mut self, _config: &SbcConfig) {}
//!     fn encode_frame(&mut self, _pcm: &[u8], out: &mut Vec<u8>) -> usize {
//!         out.push(0);
//!         1
//!     }
//! }
//!
//! let source = Box::new(|dst: &mut [u8]| { dst.fill(0); dst.len() });
//! let sink = Box::new(|_packet: btaudio_core::MediaPacket, _frames: u16| true);
//!
//! let mut session = SbcSession::new(
//!     SessionConfig::high_quality(663),
//!     0,
//!     source,
//!     sink,
//!     Box::new(NullSbc),
//! ).unwrap();
//! session.feeding_init(FeedingConfig::cd_quality()).unwrap();
//! session.feeding_reset();
//! session.send_frames(20_000);
//! ```

#![warn(missing_docs)]

pub mod bitpool;
pub mod budget;
pub mod config;
mod encoder;
pub mod error;
pub mod feeding;
pub mod rate;
pub mod session;
pub mod stats;

pub use bitpool::Negotiation;
pub use budget::{
    FrameBudgeter, TickBudget, ENCODER_INTERVAL_MS, MAX_PCM_FRAME_NUM_PER_TICK,
    MAX_PCM_ITER_NUM_PER_TICK,
};
pub use config::{
    Allocation, BlockCount, ChannelMode, FeedingConfig, SamplingRate, SbcConfig,
    SessionConfig, SubBands, UpdateParams,
};
pub use encoder::SbcEncoder;
pub use error::{A2dpError, Result};
pub use feeding::{FeedStatus, FeedingBuffer};
pub use session::SbcSession;
pub use stats::SessionStats;

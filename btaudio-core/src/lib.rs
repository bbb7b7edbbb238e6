//! # btaudio-core
//!
//! Core types and interfaces shared by the btaudio streaming components:
//! - Error handling types
//! - AVDTP media packet buffers with reserved transport-header space
//! - Wrapping 32-bit media timestamps
//! - The PCM source / packet sink callback seams

#![warn(missing_docs)]

pub mod error;
pub mod packet;
pub mod source;
pub mod timestamp;

pub use error::{Error, Result};
pub use packet::{MediaPacket, MAX_MEDIA_PACKET_FRAMES};
pub use source::{PacketSink, PcmSource};
pub use timestamp::MediaTimestamp;

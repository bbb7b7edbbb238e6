//! Callback seams between the streaming core and its neighbors.
//!
//! Both callbacks are invoked synchronously from the media task and must
//! not block; the tick driver's cadence is the only clock in the system.

use crate::packet::MediaPacket;

/// Upstream PCM producer.
pub trait PcmSource {
    /// Fill `dst` with up to `dst.len()` bytes of little-endian signed
    /// 16-bit interleaved PCM and return the number of bytes written.
    ///
    /// Returning less than `dst.len()` (including 0) signals that the
    /// producer has no more data right now; it must never write past the
    /// requested length.
    fn read(&mut self, dst: &mut [u8]) -> usize;
}

impl<F> PcmSource for F
where
    F: FnMut(&mut [u8]) -> usize,
{
    fn read(&mut self, dst: &mut [u8]) -> usize {
        self(dst)
    }
}

/// Downstream transport accepting completed media packets.
pub trait PacketSink {
    /// Offer a completed packet together with the number of frames the
    /// current tick consumed for it.
    ///
    /// Returns `true` when the packet was accepted (ownership taken) and
    /// `false` to signal back-pressure: the caller must stop producing for
    /// this tick.
    fn enqueue(&mut self, packet: MediaPacket, frames_consumed: u16) -> bool;
}

impl<F> PacketSink for F
where
    F: FnMut(MediaPacket, u16) -> bool,
{
    fn enqueue(&mut self, packet: MediaPacket, frames_consumed: u16) -> bool {
        self(packet, frames_consumed)
    }
}

//! Per-tick frame budgeting.
//!
//! The tick driver calls in on a nominal 20 ms cadence; the budgeter turns
//! the actual elapsed wall-clock time into PCM byte credit and decides how
//! many SBC frames to encode this tick and how they are split into media
//! packets. Credit not consumed (or refunded on PCM starvation) carries
//! over to the next tick.

use crate::config::FeedingConfig;
use crate::stats::SessionStats;
use tracing::{error, warn};

/// Nominal media-task tick interval in milliseconds.
pub const ENCODER_INTERVAL_MS: u64 = 20;

/// Hard ceiling on SBC frames scheduled in one tick.
pub const MAX_PCM_FRAME_NUM_PER_TICK: u32 = 14;

/// Hard ceiling on packets (budget iterations) per tick.
pub const MAX_PCM_ITER_NUM_PER_TICK: u32 = 3;

/// Expected PCM byte intake per tick for the given source.
pub fn bytes_per_tick(feeding: &FeedingConfig) -> u32 {
    (feeding.sampling_rate
        * feeding.bytes_per_sample()
        * u32::from(feeding.channels)
        * ENCODER_INTERVAL_MS as u32)
        / 1000
}

/// The budget for one tick: encode `frames_per_iteration` SBC frames into
/// each of `iterations` media packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickBudget {
    /// Number of media packets to build.
    pub iterations: u8,
    /// SBC frames per packet.
    pub frames_per_iteration: u8,
}

/// Tracks PCM byte credit across ticks.
#[derive(Debug, Default, Clone)]
pub struct FrameBudgeter {
    /// Expected PCM byte intake per nominal tick.
    bytes_per_tick: u32,
    /// Accumulated PCM byte credit; positive means frames are owed.
    counter: u32,
    /// Wall-clock time of the previous tick; `None` until the first tick,
    /// which is treated as exactly one nominal interval.
    last_frame_us: Option<u64>,
}

impl FrameBudgeter {
    /// Create an idle budgeter; call [`reset`](Self::reset) before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero all credit state and adopt a new per-tick byte rate.
    pub fn reset(&mut self, bytes_per_tick: u32) {
        self.bytes_per_tick = bytes_per_tick;
        self.counter = 0;
        self.last_frame_us = None;
    }

    /// Drop accumulated credit but keep the tick clock running.
    pub fn flush(&mut self) {
        self.counter = 0;
    }

    /// Current PCM byte credit.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Return credit for frames the packetizer could not feed.
    pub fn refund(&mut self, frames: u32, pcm_bytes_per_frame: u32) {
        self.counter = self
            .counter
            .saturating_add(frames * pcm_bytes_per_frame);
    }

    /// Compute the budget for the tick at `now_us`.
    ///
    /// `frames_per_packet` is the per-packet frame capacity (zero when it
    /// could not be derived); `pcm_bytes_per_frame` must be non-zero.
    pub fn compute(
        &mut self,
        now_us: u64,
        pcm_bytes_per_frame: u32,
        peer_is_edr: bool,
        frames_per_packet: u8,
        stats: &mut SessionStats,
    ) -> TickBudget {
        debug_assert!(pcm_bytes_per_frame > 0);

        let interval_us = ENCODER_INTERVAL_MS * 1000;
        let elapsed_us = match self.last_frame_us {
            Some(prev) => now_us.wrapping_sub(prev),
            None => interval_us,
        };
        self.last_frame_us = Some(now_us);

        let credit = (u64::from(self.bytes_per_tick) * elapsed_us / interval_us)
            .min(u64::from(u32::MAX)) as u32;
        self.counter = self.counter.saturating_add(credit);

        let mut projected = self.counter / pcm_bytes_per_frame;
        stats.observe_expected(u64::from(projected));

        if projected > MAX_PCM_FRAME_NUM_PER_TICK {
            warn!(
                projected,
                cap = MAX_PCM_FRAME_NUM_PER_TICK,
                "limiting frames to be sent this tick"
            );
            stats.observe_limited(u64::from(projected - MAX_PCM_FRAME_NUM_PER_TICK));
            projected = MAX_PCM_FRAME_NUM_PER_TICK;
        }

        let mut noi = 1u32;
        let mut nof;
        if peer_is_edr {
            nof = u32::from(frames_per_packet);
            if nof == 0 {
                error!("frames per packet unavailable, sending projected count");
                nof = projected;
            } else if nof < projected {
                noi = projected / nof;
                if noi > MAX_PCM_ITER_NUM_PER_TICK {
                    error!(
                        iterations = noi,
                        cap = MAX_PCM_ITER_NUM_PER_TICK,
                        "audio congestion, dropping surplus credit"
                    );
                    noi = MAX_PCM_ITER_NUM_PER_TICK;
                    self.counter = noi * nof * pcm_bytes_per_frame;
                }
            } else {
                noi = 1;
                nof = projected;
            }
        } else {
            noi = 1;
            if projected > MAX_PCM_FRAME_NUM_PER_TICK {
                error!(
                    projected,
                    cap = MAX_PCM_FRAME_NUM_PER_TICK,
                    "audio congestion, dropping surplus credit"
                );
                projected = MAX_PCM_FRAME_NUM_PER_TICK;
                self.counter = noi * projected * pcm_bytes_per_frame;
            }
            nof = projected;
        }

        self.counter -= noi * nof * pcm_bytes_per_frame;

        TickBudget {
            iterations: noi as u8,
            frames_per_iteration: nof as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PCM_BYTES_PER_FRAME: u32 = 512; // 8 sub-bands x 16 blocks x stereo s16
    const BYTES_PER_TICK: u32 = 3528; // 44.1 kHz stereo s16 over 20 ms

    fn budgeter() -> FrameBudgeter {
        let mut b = FrameBudgeter::new();
        b.reset(BYTES_PER_TICK);
        b
    }

    #[test]
    fn test_bytes_per_tick() {
        assert_eq!(bytes_per_tick(&FeedingConfig::new(44100, 16, 2)), 3528);
        assert_eq!(bytes_per_tick(&FeedingConfig::new(48000, 16, 2)), 3840);
        assert_eq!(bytes_per_tick(&FeedingConfig::new(16000, 16, 1)), 640);
    }

    #[test]
    fn test_first_tick_uses_nominal_interval() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        let budget = b.compute(987_654_321, PCM_BYTES_PER_FRAME, true, 7, &mut stats);

        // 3528 bytes / 512 per frame = 6 frames, under the packet capacity.
        assert_eq!(budget.iterations, 1);
        assert_eq!(budget.frames_per_iteration, 6);
        assert_eq!(b.counter(), 3528 - 6 * 512);
    }

    #[test]
    fn test_credit_accumulates_fractional_frames() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();

        let mut produced = 0u32;
        let mut now = 0u64;
        for _ in 0..10 {
            now += 20_000;
            let budget = b.compute(now, PCM_BYTES_PER_FRAME, true, 14, &mut stats);
            produced +=
                u32::from(budget.iterations) * u32::from(budget.frames_per_iteration);
        }

        // Credit conservation: intake equals frames consumed plus residue.
        assert_eq!(10 * BYTES_PER_TICK, produced * PCM_BYTES_PER_FRAME + b.counter());
    }

    #[test]
    fn test_triple_interval_splits_iterations() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        b.compute(1_000_000, PCM_BYTES_PER_FRAME, true, 7, &mut stats);
        b.flush();

        // A 60 ms gap projects 10584/512 = 20 frames, capped to 14; with 7
        // frames per packet that is exactly two packets.
        let budget = b.compute(1_060_000, PCM_BYTES_PER_FRAME, true, 7, &mut stats);
        assert_eq!(budget.iterations, 2);
        assert_eq!(budget.frames_per_iteration, 7);
    }

    #[test]
    fn test_congestion_drains_credit_edr() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        b.compute(0, PCM_BYTES_PER_FRAME, true, 1, &mut stats);

        // Enormous gap; per-tick cap holds projected at 14, and with one
        // frame per packet the iteration cap bites at 3.
        let budget = b.compute(10_000_000, PCM_BYTES_PER_FRAME, true, 1, &mut stats);
        assert_eq!(budget.iterations, 3);
        assert_eq!(budget.frames_per_iteration, 1);
        // Drained to exactly the consumed budget, then consumed.
        assert_eq!(b.counter(), 0);
        assert!(stats.limited_count > 0);
    }

    #[test]
    fn test_non_edr_single_iteration() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        b.compute(0, PCM_BYTES_PER_FRAME, false, 7, &mut stats);
        let budget = b.compute(100_000, PCM_BYTES_PER_FRAME, false, 7, &mut stats);

        assert_eq!(budget.iterations, 1);
        assert!(u32::from(budget.frames_per_iteration) <= MAX_PCM_FRAME_NUM_PER_TICK);
    }

    #[test]
    fn test_stale_packet_capacity_falls_back_to_projected() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        let budget = b.compute(0, PCM_BYTES_PER_FRAME, true, 0, &mut stats);
        assert_eq!(budget.iterations, 1);
        assert_eq!(budget.frames_per_iteration, 6);
    }

    #[test]
    fn test_refund_restores_credit() {
        let mut b = budgeter();
        let mut stats = SessionStats::default();
        b.compute(0, PCM_BYTES_PER_FRAME, true, 7, &mut stats);
        let before = b.counter();
        b.refund(4, PCM_BYTES_PER_FRAME);
        assert_eq!(b.counter(), before + 4 * PCM_BYTES_PER_FRAME);
    }
}

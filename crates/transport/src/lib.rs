//! Shared vocabulary between the arrangement core and the mixing engine:
//! timeline units, identifiers, sample data, the track volume cell and the
//! play handle hand-off.

mod audio;
mod handle;
mod volume;

use std::sync::atomic::{AtomicU64, Ordering};

pub use audio::{AudioArc, resample_audio_arc};
pub use handle::{Mixer, PlayHandle};
pub use volume::{DEFAULT_VOLUME, MAX_VOLUME, MIN_VOLUME, VOLUME_STEP, VolumeModel};

/// Timeline position or length in ticks.
pub type Tick = u64;

/// Timing resolution: ticks per quarter note.
pub const TICKS_PER_BEAT: Tick = 48;
pub const BEATS_PER_BAR: Tick = 4;
pub const TICKS_PER_BAR: Tick = TICKS_PER_BEAT * BEATS_PER_BAR;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

static NEXT_CLIP_ID: AtomicU64 = AtomicU64::new(1);

impl ClipId {
    /// A process-wide unique id.
    pub fn next() -> Self {
        ClipId(NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Audio frames per tick at `bpm` and `sample_rate`.
pub fn frames_per_tick(bpm: f64, sample_rate: u32) -> f64 {
    sample_rate as f64 * 60.0 / (bpm * TICKS_PER_BEAT as f64)
}

pub fn ticks_to_frames(ticks: Tick, frames_per_tick: f64) -> f64 {
    ticks as f64 * frames_per_tick
}

/// Ticks needed to cover `frames`, rounded up so nothing is cut short.
///
/// A quotient within rounding error of a whole number counts as that number,
/// so exact fits don't gain a tick.
pub fn frames_to_ticks(frames: usize, frames_per_tick: f64) -> Tick {
    if !(frames_per_tick.is_finite() && frames_per_tick > 0.0) {
        return 0;
    }
    let ticks = frames as f64 / frames_per_tick;
    let nearest = ticks.round();
    if (ticks - nearest).abs() <= ticks.max(1.0) * 1e-12 {
        nearest as Tick
    } else {
        ticks.ceil() as Tick
    }
}

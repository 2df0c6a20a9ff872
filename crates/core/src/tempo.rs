use cliptrack_transport::{DEFAULT_SAMPLE_RATE, TICKS_PER_BAR, TICKS_PER_BEAT, Tick};

pub const DEFAULT_BPM: f64 = 140.0;
pub const MIN_BPM: f64 = 10.0;
pub const MAX_BPM: f64 = 999.0;

/// Where clips learn how many audio frames one tick spans.
pub trait TempoSource {
    fn frames_per_tick(&self) -> f64;
    fn sample_rate(&self) -> u32;
}

/// Project tempo at a fixed engine sample rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo {
    bpm: f64,
    sample_rate: u32,
}

impl Tempo {
    pub fn new(bpm: f64, sample_rate: u32) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            sample_rate,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set the tempo, clamped to the supported range. Returns the stored value.
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn ticks_to_seconds(&self, ticks: Tick) -> f64 {
        ticks as f64 / TICKS_PER_BEAT as f64 * 60.0 / self.bpm
    }

    pub fn seconds_to_ticks(&self, seconds: f64) -> Tick {
        (seconds * self.bpm / 60.0 * TICKS_PER_BEAT as f64) as Tick
    }

    pub fn bars_to_ticks(&self, bars: u64) -> Tick {
        bars * TICKS_PER_BAR
    }
}

impl TempoSource for Tempo {
    fn frames_per_tick(&self) -> f64 {
        cliptrack_transport::frames_per_tick(self.bpm, self.sample_rate)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(DEFAULT_BPM, DEFAULT_SAMPLE_RATE)
    }
}

fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

use std::sync::atomic::{AtomicU32, Ordering};

pub const DEFAULT_VOLUME: f32 = 100.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 200.0;
pub const VOLUME_STEP: f32 = 1.0;

/// A bounded numeric parameter that can be written from the control thread while
/// the audio thread reads it.
///
/// The value is stored as `f32` bits in an `AtomicU32`. Every write is clamped to
/// `[min, max]` and snapped to the step grid, so readers never observe an out of
/// range value.
#[derive(Debug)]
pub struct VolumeModel {
    value: AtomicU32,
    default: f32,
    min: f32,
    max: f32,
    step: f32,
}

impl VolumeModel {
    /// # Panics
    ///
    /// Panics if `min > max` or `step` is negative.
    pub fn new(default: f32, min: f32, max: f32, step: f32) -> Self {
        assert!(min <= max, "min must not exceed max");
        assert!(step >= 0.0, "step must not be negative");
        let model = Self {
            value: AtomicU32::new(min.to_bits()),
            default,
            min,
            max,
            step,
        };
        model.value.store(model.fit(default).to_bits(), Ordering::Relaxed);
        model
    }

    /// The volume of a track: percent, 0 to 200, default 100.
    pub fn track_volume() -> Self {
        Self::new(DEFAULT_VOLUME, MIN_VOLUME, MAX_VOLUME, VOLUME_STEP)
    }

    #[inline]
    pub fn value(&self) -> f32 {
        f32::from_bits(self.value.load(Ordering::Relaxed))
    }

    /// Store `value` after fitting it to the range and step. Returns what was stored.
    pub fn set_value(&self, value: f32) -> f32 {
        let fitted = self.fit(value);
        self.value.store(fitted.to_bits(), Ordering::Relaxed);
        fitted
    }

    pub fn reset(&self) {
        self.set_value(self.default);
    }

    /// Linear gain applied to audio: the percentage divided by 100.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.value() / 100.0
    }

    pub fn default_value(&self) -> f32 {
        self.default
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn step(&self) -> f32 {
        self.step
    }

    fn fit(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.default.clamp(self.min, self.max);
        }
        let stepped = if self.step > 0.0 {
            self.min + ((value - self.min) / self.step).round() * self.step
        } else {
            value
        };
        stepped.clamp(self.min, self.max)
    }
}

impl Default for VolumeModel {
    fn default() -> Self {
        Self::track_volume()
    }
}

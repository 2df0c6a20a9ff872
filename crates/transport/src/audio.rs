use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Shared, immutable audio sample data.
///
/// `AudioArc` stores interleaved samples in an `Arc<[f32]>`, so cloning only bumps
/// a reference count. A sample buffer publishes one of these as its current
/// snapshot and play handles keep reading it even after the buffer has moved on
/// to new content.
///
/// ```text
/// AudioArc
/// ├─ samples: Arc<[f32]> ────> Heap: [f32; N]
/// ├─ sample_rate: u32
/// └─ channels: u16
/// ```
///
/// # Examples
///
/// ```
/// use cliptrack_transport::AudioArc;
///
/// let audio = AudioArc::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// let shared = audio.clone();
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(shared.frames(), 2);
/// ```
#[derive(Clone)]
pub struct AudioArc {
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// Create a new `AudioArc` from owned interleaved samples.
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    /// Zero frames of stereo audio. This is what an unloaded buffer holds.
    pub fn silent(sample_rate: u32) -> Self {
        Self::new(Vec::new(), sample_rate, 2)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read one frame as a stereo pair. Mono is duplicated, channels beyond the
    /// second are ignored. Out of range frames read as silence.
    #[inline]
    pub fn stereo_frame(&self, frame: usize) -> (f32, f32) {
        let channels = self.channels as usize;
        let idx = frame * channels;
        if idx + channels > self.samples.len() {
            return (0.0, 0.0);
        }
        if channels == 1 {
            let s = self.samples[idx];
            (s, s)
        } else {
            (self.samples[idx], self.samples[idx + 1])
        }
    }

    /// Interleaved stereo copy of this audio.
    pub fn to_stereo(&self) -> Self {
        if self.channels == 2 {
            return self.clone();
        }
        let mut samples = Vec::with_capacity(self.frames() * 2);
        for frame in 0..self.frames() {
            let (l, r) = self.stereo_frame(frame);
            samples.push(l);
            samples.push(r);
        }
        Self::new(samples, self.sample_rate, 2)
    }

    /// Resample this audio to a target sample rate.
    ///
    /// Returns a cheap clone when the rate already matches.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }

        resample_audio_arc(self, target_sample_rate)
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Resample an `AudioArc` with sinc interpolation.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();

    let resample_ratio = target_sample_rate as f64 / audio.sample_rate as f64;
    let output_frames = (input_frames as f64 * resample_ratio).ceil() as usize;

    // rubato wants one Vec per channel
    let mut input_channels = vec![Vec::with_capacity(input_frames); channels];
    for frame_idx in 0..input_frames {
        for (ch, input) in input_channels.iter_mut().enumerate() {
            input.push(audio.samples()[frame_idx * channels + ch]);
        }
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, input_frames, channels)?;

    let output_channels = resampler.process(&input_channels, None)?;

    let mut output_samples = Vec::with_capacity(output_frames * channels);
    for frame_idx in 0..output_channels[0].len() {
        for output in &output_channels {
            output_samples.push(output[frame_idx]);
        }
    }

    Ok(AudioArc::new(
        output_samples,
        target_sample_rate,
        audio.channels,
    ))
}

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use basedrop::{Handle, Shared, SharedCell};
use cliptrack_transport::AudioArc;

const BYTES_PER_STEREO_FRAME: usize = 2 * std::mem::size_of::<f32>();

#[derive(Debug, thiserror::Error)]
pub enum PortableTextError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{0} bytes is not a whole number of stereo frames")]
    PartialFrame(usize),
}

/// Decoded audio of one sample source, or of inline data embedded in a document.
///
/// The samples live in a [`SharedCell`]: loading new content swaps the snapshot
/// atomically, so play handles that captured the previous snapshot keep reading
/// it until they finish. Only the control thread loads content.
pub struct SampleBuffer {
    source: String,
    data: SharedCell<AudioArc>,
    sample_rate: u32,
    handle: Handle,
}

impl SampleBuffer {
    /// An empty buffer whose content will be kept at `sample_rate`.
    pub fn new(handle: &Handle, sample_rate: u32) -> Self {
        Self {
            source: String::new(),
            data: SharedCell::new(Shared::new(handle, AudioArc::silent(sample_rate))),
            sample_rate,
            handle: handle.clone(),
        }
    }

    /// The source identifier; empty means the data is inline.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Load samples from `source`. An empty identifier leaves the buffer empty.
    ///
    /// A source that cannot be resolved or decoded also leaves the buffer empty,
    /// which plays as silence. Returns whether any audio was loaded.
    pub fn set_source(&mut self, source: &str) -> bool {
        self.source = source.to_string();
        if source.is_empty() {
            self.publish(AudioArc::silent(self.sample_rate));
            return false;
        }

        match cliptrack_decode::decode_source(source, self.sample_rate) {
            Ok(audio) => {
                let audio = self.conform(audio);
                self.publish(audio);
                true
            }
            Err(e) => {
                log::warn!("could not load sample '{}': {:#}", source, e);
                self.publish(AudioArc::silent(self.sample_rate));
                false
            }
        }
    }

    /// Replace the content with already decoded audio. The source is cleared.
    ///
    /// The audio is stored as stereo at the buffer's rate.
    pub fn set_audio(&mut self, audio: AudioArc) {
        self.source.clear();
        let audio = self.conform(audio);
        self.publish(audio);
    }

    pub fn frames(&self) -> usize {
        self.data.get().frames()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// The current content. Cloning the snapshot does not allocate.
    pub fn snapshot(&self) -> Shared<AudioArc> {
        self.data.get()
    }

    /// Base64 of the little-endian `f32` bytes of the interleaved stereo frames.
    pub fn encode_to_portable_text(&self) -> String {
        let audio = self.data.get();
        let mut bytes = Vec::with_capacity(audio.len() * std::mem::size_of::<f32>());
        for sample in audio.samples() {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        STANDARD.encode(bytes)
    }

    /// Replace the content with inline data produced by
    /// [`encode_to_portable_text`](Self::encode_to_portable_text).
    ///
    /// Malformed text empties the buffer. Returns whether the text was valid.
    pub fn decode_from_portable_text(&mut self, text: &str) -> bool {
        self.source.clear();
        match decode_portable_text(text) {
            Ok(samples) => {
                self.publish(AudioArc::new(samples, self.sample_rate, 2));
                true
            }
            Err(e) => {
                log::warn!("discarding inline sample data: {}", e);
                self.publish(AudioArc::silent(self.sample_rate));
                false
            }
        }
    }

    /// Stereo at the buffer's rate, the only layout the buffer holds.
    fn conform(&self, audio: AudioArc) -> AudioArc {
        match audio.to_stereo().resample(self.sample_rate) {
            Ok(audio) => audio,
            Err(e) => {
                log::warn!("could not resample sample to {} Hz: {:#}", self.sample_rate, e);
                AudioArc::silent(self.sample_rate)
            }
        }
    }

    fn publish(&self, audio: AudioArc) {
        self.data.set(Shared::new(&self.handle, audio));
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("source", &self.source)
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn decode_portable_text(text: &str) -> Result<Vec<f32>, PortableTextError> {
    let bytes = STANDARD.decode(text.trim())?;
    if bytes.len() % BYTES_PER_STEREO_FRAME != 0 {
        return Err(PortableTextError::PartialFrame(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(std::mem::size_of::<f32>())
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

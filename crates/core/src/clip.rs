use basedrop::{Handle, Shared};
use cliptrack_project::Element;
use cliptrack_transport::{
    AudioArc, ClipId, PlayHandle, TICKS_PER_BAR, Tick, TrackId, VolumeModel, frames_to_ticks,
};

use crate::sample_buffer::SampleBuffer;
use crate::view::ViewFactory;

/// No clip is shorter than one bar.
pub const MIN_CLIP_LENGTH: Tick = TICKS_PER_BAR;

pub const CLIP_NODE_NAME: &str = "sampletco";

/// Drag-and-drop key carrying a source identifier.
pub const DRAG_SAMPLE_FILE: &str = "samplefile";
/// Drag-and-drop key carrying inline sample data.
pub const DRAG_SAMPLE_DATA: &str = "sampledata";

/// Where a clip is being saved to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveContext {
    #[default]
    Arrangement,
    /// Copy/paste buffer: the position is not stored, so pasting keeps the
    /// target position.
    Clipboard,
}

/// Tick length of `frames` of audio, rounded up and never below
/// [`MIN_CLIP_LENGTH`]. A non-positive rate yields the minimum.
pub fn computed_length(frames: usize, frames_per_tick: f64) -> Tick {
    frames_to_ticks(frames, frames_per_tick).max(MIN_CLIP_LENGTH)
}

/// A sample placed on a track's timeline.
pub struct TimelineClip {
    id: ClipId,
    track: TrackId,
    position: Tick,
    length: Tick,
    muted: bool,
    buffer: SampleBuffer,
    frames_per_tick: f64,
    content_version: u64,
    content_changed: bool,
}

impl TimelineClip {
    pub(crate) fn new(
        track: TrackId,
        handle: &Handle,
        sample_rate: u32,
        frames_per_tick: f64,
    ) -> Self {
        Self {
            id: ClipId::next(),
            track,
            position: 0,
            length: MIN_CLIP_LENGTH,
            muted: false,
            buffer: SampleBuffer::new(handle, sample_rate),
            frames_per_tick,
            content_version: 0,
            content_changed: false,
        }
    }

    pub fn id(&self) -> ClipId {
        self.id
    }

    /// The track this clip belongs to.
    pub fn track_id(&self) -> TrackId {
        self.track
    }

    pub fn start_position(&self) -> Tick {
        self.position
    }

    pub fn end_position(&self) -> Tick {
        self.position + self.length
    }

    pub fn move_position(&mut self, position: Tick) {
        self.position = position;
    }

    pub fn length(&self) -> Tick {
        self.length
    }

    /// Set the length, clamped to [`MIN_CLIP_LENGTH`].
    pub fn change_length(&mut self, length: Tick) {
        self.length = length.max(MIN_CLIP_LENGTH);
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn frames_per_tick(&self) -> f64 {
        self.frames_per_tick
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn sample_source(&self) -> &str {
        self.buffer.source()
    }

    /// Tick length of the content itself, without the minimum.
    pub fn sample_length(&self) -> Tick {
        frames_to_ticks(self.buffer.frames(), self.frames_per_tick)
    }

    /// Bumped every time the content changes. Views compare it to decide
    /// whether to redraw.
    pub fn content_version(&self) -> u64 {
        self.content_version
    }

    pub fn is_content_changed(&self) -> bool {
        self.content_changed
    }

    pub(crate) fn clear_content_changed(&mut self) {
        self.content_changed = false;
    }

    /// Load a new source and derive the length from it.
    pub fn set_source(&mut self, source: &str) {
        log::debug!("clip {:?}: loading source '{}'", self.id, source);
        self.buffer.set_source(source);
        self.content_updated();
    }

    /// Use already decoded audio as inline content.
    pub fn set_audio(&mut self, audio: AudioArc) {
        self.buffer.set_audio(audio);
        self.content_updated();
    }

    /// Adopt inline portable-text data. Malformed data leaves a silent clip.
    pub fn load_inline_data(&mut self, text: &str) -> bool {
        let ok = self.buffer.decode_from_portable_text(text);
        self.content_updated();
        ok
    }

    /// Re-derive the length for a new tempo. The position is untouched.
    pub fn on_tempo_changed(&mut self, frames_per_tick: f64) {
        self.frames_per_tick = frames_per_tick;
        self.update_length();
    }

    pub fn update_length(&mut self) {
        self.length = computed_length(self.buffer.frames(), self.frames_per_tick);
    }

    pub fn save_settings(&self, context: SaveContext) -> Element {
        let position = match context {
            SaveContext::Arrangement => self.position as i64,
            SaveContext::Clipboard => -1,
        };
        let mut element = Element::new(CLIP_NODE_NAME)
            .with_attribute("pos", position)
            .with_attribute("len", self.length)
            .with_attribute("muted", self.muted as i32)
            .with_attribute("src", self.sample_source());
        if self.sample_source().is_empty() {
            element.set_attribute("data", self.buffer.encode_to_portable_text());
        }
        element
    }

    /// Restore state saved by [`save_settings`](Self::save_settings).
    ///
    /// The stored length is applied after the source, because loading a source
    /// derives a length of its own.
    pub fn load_settings(&mut self, element: &Element) {
        let position = element.attr_i64("pos");
        if position >= 0 {
            self.move_position(position as Tick);
        }
        self.set_source(element.attr_str("src"));
        if self.sample_source().is_empty() {
            if let Some(data) = element.attribute("data") {
                self.load_inline_data(data);
            }
        }
        self.change_length(element.attr_i64("len").max(0) as Tick);
        self.set_muted(element.attr_bool("muted"));
    }

    /// Apply a drag-and-drop payload. Returns `false` for keys clips don't accept.
    pub fn apply_drop(&mut self, key: &str, value: &str) -> bool {
        match key {
            DRAG_SAMPLE_FILE => {
                self.set_source(value);
                true
            }
            DRAG_SAMPLE_DATA => {
                self.load_inline_data(value);
                true
            }
            _ => false,
        }
    }

    pub fn create_view<F: ViewFactory>(&self, factory: &mut F) -> F::ClipView {
        factory.clip_view(self)
    }

    /// A handle playing the current content through `volume`.
    pub(crate) fn play_handle(&self, volume: &Shared<VolumeModel>, offset: usize) -> PlayHandle {
        PlayHandle::new(self.track, self.id, self.buffer.snapshot(), volume.clone())
            .with_offset(offset)
            .with_muted(self.muted)
    }

    fn content_updated(&mut self) {
        self.update_length();
        self.content_version += 1;
        self.content_changed = true;
    }
}

impl std::fmt::Debug for TimelineClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineClip")
            .field("id", &self.id)
            .field("track", &self.track)
            .field("position", &self.position)
            .field("length", &self.length)
            .field("muted", &self.muted)
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basedrop::Collector;

    fn clip(collector: &Collector, frames_per_tick: f64) -> TimelineClip {
        TimelineClip::new(TrackId(1), &collector.handle(), 48000, frames_per_tick)
    }

    fn stereo(frames: usize) -> AudioArc {
        AudioArc::new(vec![0.25; frames * 2], 48000, 2)
    }

    #[test]
    fn test_computed_length_rounds_up() {
        assert_eq!(computed_length(48000, 12.0), 4000);
        assert_eq!(computed_length(48005, 12.0), 4001);
    }

    #[test]
    fn test_computed_length_never_below_minimum() {
        for frames in [0, 1, 100, 2303, 2304, 2305] {
            assert!(computed_length(frames, 12.0) >= MIN_CLIP_LENGTH);
        }
        assert_eq!(computed_length(0, 12.0), MIN_CLIP_LENGTH);
        assert_eq!(computed_length(1_000_000, 0.0), MIN_CLIP_LENGTH);
        assert_eq!(computed_length(1_000_000, f64::INFINITY), MIN_CLIP_LENGTH);
    }

    #[test]
    fn test_computed_length_monotonic_in_frames_per_tick() {
        let rates = [1.0, 2.5, 12.0, 100.0, 459.375, 500.0, 4410.0];
        for frames in [0, 1, 4410, 48000, 441_000] {
            for pair in rates.windows(2) {
                assert!(
                    computed_length(frames, pair[1]) <= computed_length(frames, pair[0]),
                    "frames {} got longer from fpt {} to {}",
                    frames,
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn test_new_clip_is_silent_placeholder() {
        let collector = Collector::new();
        let clip = clip(&collector, 12.0);

        assert_eq!(clip.start_position(), 0);
        assert_eq!(clip.length(), MIN_CLIP_LENGTH);
        assert!(!clip.is_muted());
        assert_eq!(clip.buffer().frames(), 0);
        assert_eq!(clip.track_id(), TrackId(1));
    }

    #[test]
    fn test_set_audio_derives_length() {
        let collector = Collector::new();
        let mut clip = clip(&collector, 12.0);
        clip.set_audio(stereo(48000));

        assert_eq!(clip.length(), 4000);
        assert_eq!(clip.sample_length(), 4000);
        assert_eq!(clip.content_version(), 1);
        assert!(clip.is_content_changed());
    }

    #[test]
    fn test_exact_fit_at_fractional_frames_per_tick() {
        use crate::tempo::{Tempo, TempoSource};

        let collector = Collector::new();
        let tempo = Tempo::new(90.0, 48000);
        let mut clip = clip(&collector, tempo.frames_per_tick());
        clip.set_audio(stereo(168000));

        assert_eq!(clip.length(), 252);
        assert_eq!(clip.sample_length(), 252);
    }

    #[test]
    fn test_unreadable_source_gives_minimum_length() {
        let collector = Collector::new();
        let mut clip = clip(&collector, 12.0);
        clip.set_audio(stereo(48000));
        clip.set_source("missing/file.wav");

        assert_eq!(clip.length(), MIN_CLIP_LENGTH);
        assert_eq!(clip.sample_source(), "missing/file.wav");
    }

    #[test]
    fn test_tempo_change_keeps_position() {
        let collector = Collector::new();
        let mut clip = clip(&collector, 12.0);
        clip.set_audio(stereo(48000));
        clip.move_position(384);

        clip.on_tempo_changed(24.0);

        assert_eq!(clip.length(), 2000);
        assert_eq!(clip.start_position(), 384);
        assert_eq!(clip.end_position(), 2384);
    }

    #[test]
    fn test_change_length_is_clamped() {
        let collector = Collector::new();
        let mut clip = clip(&collector, 12.0);
        clip.change_length(10);
        assert_eq!(clip.length(), MIN_CLIP_LENGTH);
        clip.change_length(1000);
        assert_eq!(clip.length(), 1000);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let collector = Collector::new();
        let mut original = clip(&collector, 12.0);
        original.set_audio(stereo(4800));
        original.move_position(768);
        original.change_length(900);
        original.set_muted(true);

        let element = original.save_settings(SaveContext::Arrangement);
        assert_eq!(element.name, CLIP_NODE_NAME);
        assert_eq!(element.attr_str("src"), "");
        assert!(element.has_attribute("data"));

        let mut restored = clip(&collector, 12.0);
        restored.load_settings(&element);

        assert_eq!(restored.start_position(), 768);
        assert_eq!(restored.length(), 900);
        assert!(restored.is_muted());
        assert_eq!(restored.sample_source(), "");
        assert_eq!(restored.buffer().frames(), 4800);
    }

    #[test]
    fn test_save_with_source_omits_data() {
        let collector = Collector::new();
        let mut original = clip(&collector, 12.0);
        original.set_source("drums/kick.wav");

        let element = original.save_settings(SaveContext::Arrangement);
        assert_eq!(element.attr_str("src"), "drums/kick.wav");
        assert!(!element.has_attribute("data"));

        let mut restored = clip(&collector, 12.0);
        restored.load_settings(&element);
        assert_eq!(restored.sample_source(), "drums/kick.wav");
        assert_eq!(restored.length(), original.length());
    }

    #[test]
    fn test_clipboard_save_keeps_target_position() {
        let collector = Collector::new();
        let mut original = clip(&collector, 12.0);
        original.move_position(192);

        let element = original.save_settings(SaveContext::Clipboard);
        assert_eq!(element.attr_i64("pos"), -1);

        let mut pasted = clip(&collector, 12.0);
        pasted.move_position(1536);
        pasted.load_settings(&element);
        assert_eq!(pasted.start_position(), 1536);
        assert_eq!(pasted.length(), original.length());
    }

    #[test]
    fn test_load_empty_element_gives_silent_clip() {
        let collector = Collector::new();
        let mut clip = clip(&collector, 12.0);
        clip.move_position(96);
        clip.set_muted(true);

        clip.load_settings(&Element::new(CLIP_NODE_NAME));

        assert_eq!(clip.start_position(), 0);
        assert_eq!(clip.length(), MIN_CLIP_LENGTH);
        assert!(!clip.is_muted());
        assert_eq!(clip.buffer().frames(), 0);
    }

    #[test]
    fn test_apply_drop_payloads() {
        let collector = Collector::new();
        let mut source = clip(&collector, 12.0);
        source.set_audio(stereo(24000));
        let data = source.buffer().encode_to_portable_text();

        let mut target = clip(&collector, 12.0);
        assert!(target.apply_drop(DRAG_SAMPLE_DATA, &data));
        assert_eq!(target.length(), 2000);

        assert!(target.apply_drop(DRAG_SAMPLE_FILE, "missing.wav"));
        assert_eq!(target.sample_source(), "missing.wav");
        assert_eq!(target.length(), MIN_CLIP_LENGTH);

        let version = target.content_version();
        assert!(!target.apply_drop("presetfile", "lead.xpf"));
        assert_eq!(target.content_version(), version);
    }

    #[test]
    fn test_play_handle_carries_snapshot_and_offset() {
        let collector = Collector::new();
        let handle = collector.handle();
        let mut clip = clip(&collector, 12.0);
        clip.set_audio(stereo(10));
        let volume = Shared::new(&handle, VolumeModel::track_volume());

        let play = clip.play_handle(&volume, 32);
        assert_eq!(play.clip(), clip.id());
        assert_eq!(play.owner(), TrackId(1));
        assert_eq!(play.frames(), 10);
        assert_eq!(play.offset(), 32);
    }
}

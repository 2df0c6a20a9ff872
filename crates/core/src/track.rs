use basedrop::{Handle, Shared};
use cliptrack_project::Element;
use cliptrack_transport::{ClipId, Mixer, Tick, TrackId, VolumeModel};

use crate::clip::{CLIP_NODE_NAME, SaveContext, TimelineClip};
use crate::fx::{EffectChain, FxChain};
use crate::model::ModelSettings;
use crate::tempo::TempoSource;
use crate::view::{TrackKind, ViewFactory};

pub const TRACK_NODE_NAME: &str = "track";
pub const DEFAULT_TRACK_NAME: &str = "Sample track";

/// A track that arranges samples.
///
/// Clips are kept in arrangement order. Several clips may start on the same
/// tick; each of them triggers.
pub struct Track {
    id: TrackId,
    name: String,
    clips: Vec<TimelineClip>,
    volume: Shared<VolumeModel>,
    effects: Box<dyn EffectChain>,
    muted: bool,
    modified: bool,
    frames_per_tick: f64,
    sample_rate: u32,
    handle: Handle,
}

impl Track {
    pub fn new(id: TrackId, handle: &Handle, tempo: &dyn TempoSource) -> Self {
        Self::with_effects(id, handle, tempo, Box::new(FxChain::new()))
    }

    pub fn with_effects(
        id: TrackId,
        handle: &Handle,
        tempo: &dyn TempoSource,
        effects: Box<dyn EffectChain>,
    ) -> Self {
        Self {
            id,
            name: DEFAULT_TRACK_NAME.to_string(),
            clips: Vec::new(),
            volume: Shared::new(handle, VolumeModel::track_volume()),
            effects,
            muted: false,
            modified: false,
            frames_per_tick: tempo.frames_per_tick(),
            sample_rate: tempo.sample_rate(),
            handle: handle.clone(),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        TrackKind::Sample
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.modified = true;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.modified = true;
    }

    /// The volume shared with every handle this track creates.
    pub fn volume(&self) -> &VolumeModel {
        &self.volume
    }

    pub fn effects(&self) -> &dyn EffectChain {
        self.effects.as_ref()
    }

    pub fn effects_mut(&mut self) -> &mut dyn EffectChain {
        self.effects.as_mut()
    }

    pub fn clips(&self) -> &[TimelineClip] {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&TimelineClip> {
        self.clips.iter().find(|c| c.id() == id)
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut TimelineClip> {
        self.clips.iter_mut().find(|c| c.id() == id)
    }

    /// Trigger every clip that starts exactly at `start`.
    ///
    /// Called once per processing period from the audio thread. Each triggering,
    /// unmuted clip yields one play handle starting `offset` frames into the
    /// period. Returns whether the mixer accepted at least one handle.
    pub fn play(
        &mut self,
        start: Tick,
        frames: usize,
        offset: usize,
        mixer: &mut dyn Mixer,
    ) -> bool {
        debug_assert!(offset <= frames, "offset lies outside the period");
        self.effects.start_running();
        if self.muted {
            return false;
        }

        let mut played = false;
        for clip in &self.clips {
            if clip.start_position() != start || clip.is_muted() {
                continue;
            }
            played |= mixer.add_play_handle(clip.play_handle(&self.volume, offset));
        }
        played
    }

    /// A new, silent clip at `position` that belongs to this track.
    pub fn create_clip(&self, position: Tick) -> TimelineClip {
        let mut clip =
            TimelineClip::new(self.id, &self.handle, self.sample_rate, self.frames_per_tick);
        clip.move_position(position);
        clip
    }

    /// Add a clip made by [`create_clip`](Self::create_clip). Clips of other
    /// tracks are handed back.
    pub fn add_clip(&mut self, mut clip: TimelineClip) -> Result<ClipId, TimelineClip> {
        if clip.track_id() != self.id {
            return Err(clip);
        }
        if clip.frames_per_tick() != self.frames_per_tick {
            clip.on_tempo_changed(self.frames_per_tick);
        }
        let id = clip.id();
        self.clips.push(clip);
        self.modified = true;
        Ok(id)
    }

    pub fn insert_clip(&mut self, position: Tick) -> &mut TimelineClip {
        let clip = self.create_clip(position);
        self.clips.push(clip);
        self.modified = true;
        let last = self.clips.len() - 1;
        &mut self.clips[last]
    }

    /// Remove a clip after revoking whatever the mixer is still playing of it.
    pub fn remove_clip(&mut self, id: ClipId, mixer: &mut dyn Mixer) -> Option<TimelineClip> {
        let index = self.clips.iter().position(|c| c.id() == id)?;
        mixer.remove_clip_handles(id);
        self.modified = true;
        Some(self.clips.remove(index))
    }

    pub fn on_tempo_changed(&mut self, frames_per_tick: f64) {
        self.frames_per_tick = frames_per_tick;
        for clip in &mut self.clips {
            clip.on_tempo_changed(frames_per_tick);
        }
    }

    /// Whether the track or any clip content changed since the last
    /// [`mark_saved`](Self::mark_saved).
    pub fn is_modified(&self) -> bool {
        self.modified || self.clips.iter().any(TimelineClip::is_content_changed)
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
        for clip in &mut self.clips {
            clip.clear_content_changed();
        }
    }

    /// Effect chain state and volume.
    pub fn save_settings(&self, element: &mut Element) {
        self.effects.save_state(element);
        self.volume.save_settings(element, "vol");
    }

    /// Counterpart of [`save_settings`](Self::save_settings). The effect chain
    /// is cleared first so repeated loads don't pile up effects.
    pub fn load_settings(&mut self, element: &Element) {
        self.effects.clear();
        let node_name = self.effects.node_name().to_string();
        for child in element.children_named(&node_name) {
            self.effects.restore_state(child);
        }
        self.volume.load_settings(element, "vol");
    }

    /// The whole track: name, mute, settings and clips.
    pub fn save_state(&self) -> Element {
        let mut element = Element::new(TRACK_NODE_NAME)
            .with_attribute("name", &self.name)
            .with_attribute("muted", self.muted as i32);
        self.save_settings(&mut element);
        for clip in &self.clips {
            element.append_child(clip.save_settings(SaveContext::Arrangement));
        }
        element
    }

    /// Replace the track's state. Handles still playing old clips are revoked.
    pub fn load_state(&mut self, element: &Element, mixer: &mut dyn Mixer) {
        mixer.remove_play_handles(self.id);
        self.clips.clear();

        self.name = element
            .attribute("name")
            .unwrap_or(DEFAULT_TRACK_NAME)
            .to_string();
        self.muted = element.attr_bool("muted");
        self.load_settings(element);

        for node in element.children_named(CLIP_NODE_NAME) {
            let mut clip = self.create_clip(0);
            clip.load_settings(node);
            self.clips.push(clip);
        }
        self.mark_saved();
    }

    pub fn create_view<F: ViewFactory>(&self, factory: &mut F) -> F::TrackView {
        factory.track_view(self.kind(), self)
    }

    /// Tear the track down. Every handle it created is revoked first, so none
    /// outlives the track's volume.
    pub fn destroy(self, mixer: &mut dyn Mixer) {
        log::debug!("destroying track {:?} '{}'", self.id, self.name);
        mixer.remove_play_handles(self.id);
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("clips", &self.clips.len())
            .field("volume", &self.volume.value())
            .field("muted", &self.muted)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clip::MIN_CLIP_LENGTH;
    use basedrop::Collector;
    use cliptrack_transport::{AudioArc, PlayHandle};

    pub(crate) struct FixedTempo(pub f64);

    impl TempoSource for FixedTempo {
        fn frames_per_tick(&self) -> f64 {
            self.0
        }

        fn sample_rate(&self) -> u32 {
            48000
        }
    }

    /// Mixer that keeps every handle it is given and counts revocations.
    #[derive(Default)]
    pub(crate) struct RecordingMixer {
        pub handles: Vec<PlayHandle>,
        pub revoked: usize,
        pub track_requests: Vec<TrackId>,
    }

    impl Mixer for RecordingMixer {
        fn add_play_handle(&mut self, handle: PlayHandle) -> bool {
            self.handles.push(handle);
            true
        }

        fn remove_play_handles(&mut self, owner: TrackId) {
            self.track_requests.push(owner);
            let before = self.handles.len();
            self.handles.retain(|h| h.owner() != owner);
            self.revoked += before - self.handles.len();
        }

        fn remove_clip_handles(&mut self, clip: ClipId) {
            let before = self.handles.len();
            self.handles.retain(|h| h.clip() != clip);
            self.revoked += before - self.handles.len();
        }
    }

    fn stereo(frames: usize) -> AudioArc {
        AudioArc::new(vec![0.1; frames * 2], 48000, 2)
    }

    fn track_with_clips(collector: &Collector, positions: &[Tick]) -> Track {
        let mut track = Track::new(TrackId(1), &collector.handle(), &FixedTempo(12.0));
        for &position in positions {
            track.insert_clip(position).set_audio(stereo(48000));
        }
        track
    }

    #[test]
    fn test_play_triggers_exact_tick_only() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 192, 384]);
        let mut mixer = RecordingMixer::default();

        assert!(track.clips().iter().all(|c| c.length() == 4000));

        assert!(track.play(192, 256, 0, &mut mixer));
        assert_eq!(mixer.handles.len(), 1);
        assert_eq!(mixer.handles[0].clip(), track.clips()[1].id());

        assert!(!track.play(100, 256, 0, &mut mixer));
        assert_eq!(mixer.handles.len(), 1);
    }

    #[test]
    fn test_play_empty_track() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[]);
        let mut mixer = RecordingMixer::default();

        assert!(!track.play(0, 256, 0, &mut mixer));
        assert!(mixer.handles.is_empty());
    }

    #[test]
    fn test_play_reports_only_accepted_handles() {
        struct FullMixer {
            room: usize,
            dropped: usize,
        }

        impl Mixer for FullMixer {
            fn add_play_handle(&mut self, _handle: PlayHandle) -> bool {
                if self.room == 0 {
                    self.dropped += 1;
                    return false;
                }
                self.room -= 1;
                true
            }
            fn remove_play_handles(&mut self, _owner: TrackId) {}
            fn remove_clip_handles(&mut self, _clip: ClipId) {}
            fn take_dropped_handles(&mut self) -> usize {
                std::mem::take(&mut self.dropped)
            }
        }

        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 0, 192]);

        let mut full = FullMixer { room: 0, dropped: 0 };
        assert!(!track.play(0, 256, 0, &mut full));
        assert_eq!(full.take_dropped_handles(), 2);
        assert_eq!(full.take_dropped_handles(), 0);

        let mut one_left = FullMixer { room: 1, dropped: 0 };
        assert!(track.play(0, 256, 0, &mut one_left));
        assert_eq!(one_left.take_dropped_handles(), 1);
    }

    #[test]
    fn test_play_triggers_every_clip_on_the_tick() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 0, 192]);
        let mut mixer = RecordingMixer::default();

        assert!(track.play(0, 256, 17, &mut mixer));
        assert_eq!(mixer.handles.len(), 2);
        assert!(mixer.handles.iter().all(|h| h.offset() == 17));
        assert!(mixer.handles.iter().all(|h| h.owner() == TrackId(1)));
    }

    #[test]
    fn test_play_skips_muted_clips() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 0]);
        let mut mixer = RecordingMixer::default();
        for id in track.clips().iter().map(|c| c.id()).collect::<Vec<_>>() {
            track.clip_mut(id).expect("clip").set_muted(true);
        }

        assert!(!track.play(0, 256, 0, &mut mixer));
        assert!(mixer.handles.is_empty());

        let first = track.clips()[0].id();
        track.clip_mut(first).expect("clip").set_muted(false);
        assert!(track.play(0, 256, 0, &mut mixer));
        assert_eq!(mixer.handles.len(), 1);
    }

    #[test]
    fn test_play_muted_track() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0]);
        let mut mixer = RecordingMixer::default();
        track.set_muted(true);

        assert!(!track.play(0, 256, 0, &mut mixer));
        assert!(mixer.handles.is_empty());
    }

    #[test]
    fn test_play_starts_effect_chain() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingChain(Arc<AtomicUsize>);

        impl EffectChain for CountingChain {
            fn node_name(&self) -> &str {
                "counting"
            }
            fn save_state(&self, _parent: &mut Element) {}
            fn restore_state(&mut self, _element: &Element) {}
            fn clear(&mut self) {}
            fn start_running(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let collector = Collector::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let mut track = Track::with_effects(
            TrackId(4),
            &collector.handle(),
            &FixedTempo(12.0),
            Box::new(CountingChain(starts.clone())),
        );
        let mut mixer = RecordingMixer::default();

        track.play(0, 64, 0, &mut mixer);
        track.set_muted(true);
        track.play(0, 64, 0, &mut mixer);

        assert_eq!(starts.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_handles_share_track_volume() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0]);
        let mut mixer = RecordingMixer::default();
        track.play(0, 256, 0, &mut mixer);

        track.volume().set_value(50.0);
        assert_eq!(mixer.handles[0].volume().value(), 50.0);
    }

    #[test]
    fn test_destroy_revokes_all_handles() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 0, 192]);
        let mut other = Track::new(TrackId(2), &collector.handle(), &FixedTempo(12.0));
        other.insert_clip(0).set_audio(stereo(100));
        let mut mixer = RecordingMixer::default();

        track.play(0, 256, 0, &mut mixer);
        track.play(192, 256, 0, &mut mixer);
        other.play(0, 256, 0, &mut mixer);
        assert_eq!(mixer.handles.len(), 4);

        track.destroy(&mut mixer);

        assert_eq!(mixer.revoked, 3);
        assert_eq!(mixer.track_requests, vec![TrackId(1)]);
        assert_eq!(mixer.handles.len(), 1);
        assert!(mixer.handles.iter().all(|h| h.owner() == TrackId(2)));
    }

    #[test]
    fn test_remove_clip_revokes_its_handles() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 0]);
        let mut mixer = RecordingMixer::default();
        track.play(0, 256, 0, &mut mixer);

        let removed_id = track.clips()[0].id();
        let removed = track.remove_clip(removed_id, &mut mixer).expect("removed");

        assert_eq!(removed.id(), removed_id);
        assert_eq!(mixer.revoked, 1);
        assert_eq!(track.clips().len(), 1);
        assert!(track.remove_clip(removed_id, &mut mixer).is_none());
    }

    #[test]
    fn test_create_clip_belongs_to_track() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[]);
        let clip = track.create_clip(576);

        assert_eq!(clip.track_id(), track.id());
        assert_eq!(clip.start_position(), 576);
        assert_eq!(clip.length(), MIN_CLIP_LENGTH);
        assert_eq!(clip.buffer().frames(), 0);

        let id = track.add_clip(clip).expect("own clip");
        assert!(track.clip(id).is_some());
    }

    #[test]
    fn test_add_clip_rejects_foreign_clip() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[]);
        let other = Track::new(TrackId(9), &collector.handle(), &FixedTempo(12.0));

        let foreign = other.create_clip(0);
        assert!(track.add_clip(foreign).is_err());
        assert!(track.clips().is_empty());
    }

    #[test]
    fn test_tempo_change_fans_out() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 192]);

        track.on_tempo_changed(6.0);

        assert!(track.clips().iter().all(|c| c.length() == 8000));
        assert_eq!(track.clips()[1].start_position(), 192);
        assert_eq!(track.create_clip(0).frames_per_tick(), 6.0);
    }

    #[test]
    fn test_settings_roundtrip_and_repeated_load() {
        let collector = Collector::new();
        let mut chain = FxChain::new();
        chain.set_enabled(true);
        chain.push_effect(Element::new("effect").with_attribute("name", "eq"));
        let mut track = Track::with_effects(
            TrackId(1),
            &collector.handle(),
            &FixedTempo(12.0),
            Box::new(chain),
        );
        track.volume().set_value(64.0);

        let mut element = Element::new(TRACK_NODE_NAME);
        track.save_settings(&mut element);
        assert_eq!(element.attr_f32("vol"), 64.0);

        let mut restored = Track::new(TrackId(2), &collector.handle(), &FixedTempo(12.0));
        restored.load_settings(&element);
        restored.load_settings(&element);

        let mut saved_again = Element::new(TRACK_NODE_NAME);
        restored.save_settings(&mut saved_again);
        let fx = saved_again.child(FxChain::NODE_NAME).expect("fxchain");
        assert_eq!(fx.attr_i64("numofeffects"), 1);
        assert!(fx.attr_bool("enabled"));
        assert_eq!(restored.volume().value(), 64.0);
    }

    #[test]
    fn test_state_roundtrip() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0, 384]);
        track.set_name("Breaks");
        track.set_muted(true);
        let second = track.clips()[1].id();
        track.clip_mut(second).expect("clip").set_muted(true);

        let element = track.save_state();

        let mut restored = Track::new(TrackId(1), &collector.handle(), &FixedTempo(12.0));
        let mut mixer = RecordingMixer::default();
        restored.load_state(&element, &mut mixer);

        assert_eq!(restored.name(), "Breaks");
        assert!(restored.is_muted());
        assert_eq!(restored.clips().len(), 2);
        assert_eq!(restored.clips()[1].start_position(), 384);
        assert!(restored.clips()[1].is_muted());
        assert_eq!(restored.clips()[0].length(), 4000);
        assert_eq!(restored.clips()[0].buffer().frames(), 48000);
        assert!(restored.clips().iter().all(|c| c.track_id() == TrackId(1)));
        assert!(!restored.is_modified());
        assert_eq!(mixer.track_requests, vec![TrackId(1)]);
    }

    #[test]
    fn test_modified_flag_follows_clip_content() {
        let collector = Collector::new();
        let mut track = track_with_clips(&collector, &[0]);
        assert!(track.is_modified());

        track.mark_saved();
        assert!(!track.is_modified());

        let id = track.clips()[0].id();
        track
            .clip_mut(id)
            .expect("clip")
            .apply_drop(crate::clip::DRAG_SAMPLE_FILE, "gone.wav");
        assert!(track.is_modified());
    }

    #[test]
    fn test_create_view() {
        struct Names;
        impl ViewFactory for Names {
            type TrackView = String;
            type ClipView = Tick;

            fn track_view(&mut self, kind: TrackKind, track: &Track) -> String {
                format!("{:?}:{}", kind, track.name())
            }

            fn clip_view(&mut self, clip: &TimelineClip) -> Tick {
                clip.start_position()
            }
        }

        let collector = Collector::new();
        let track = track_with_clips(&collector, &[384]);
        let mut factory = Names;

        assert_eq!(track.create_view(&mut factory), "Sample:Sample track");
        assert_eq!(track.clips()[0].create_view(&mut factory), 384);
    }
}

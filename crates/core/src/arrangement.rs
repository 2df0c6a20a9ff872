use std::path::Path;

use basedrop::{Collector, Handle};
use cliptrack_project::{DocumentFormat, Element, ProjectError, load_document, save_document};
use cliptrack_transport::{Mixer, Tick, TrackId};

use crate::tempo::{DEFAULT_BPM, Tempo, TempoSource};
use crate::track::{TRACK_NODE_NAME, Track};

pub const SONG_NODE_NAME: &str = "song";

/// The tracks of a song, the tempo they follow and the mixer they play into.
///
/// The arrangement is the only place tracks are created or destroyed, so it is
/// where the revocation protocol is enforced: a track that goes away, including
/// when the arrangement itself is dropped, has its play handles revoked first.
pub struct Arrangement<M: Mixer> {
    tempo: Tempo,
    tracks: Vec<Track>,
    mixer: M,
    next_track_id: u64,
    // Declared last so it is dropped after everything that allocated through it
    collector: Collector,
}

impl<M: Mixer> Arrangement<M> {
    pub fn new(mixer: M, tempo: Tempo) -> Self {
        Self {
            tempo,
            tracks: Vec::new(),
            mixer,
            next_track_id: 1,
            collector: Collector::new(),
        }
    }

    pub fn from_file(path: &Path, mixer: M, sample_rate: u32) -> Result<Self, ProjectError> {
        let mut arrangement = Self::new(mixer, Tempo::new(DEFAULT_BPM, sample_rate));
        arrangement.load_from_file(path)?;
        Ok(arrangement)
    }

    /// Allocation handle for data shared with the audio thread.
    pub fn handle(&self) -> Handle {
        self.collector.handle()
    }

    /// Reclaim shared data the audio thread has let go of, and report handles
    /// the mixer had to drop since the last call. Control thread only.
    pub fn collect(&mut self) -> usize {
        self.collector.collect();
        let dropped = self.mixer.take_dropped_handles();
        if dropped > 0 {
            log::warn!("mixer dropped {dropped} play handles");
        }
        dropped
    }

    pub fn tempo(&self) -> &Tempo {
        &self.tempo
    }

    /// Change the tempo and let every clip re-derive its length.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        let bpm = self.tempo.set_bpm(bpm);
        let frames_per_tick = self.tempo.frames_per_tick();
        for track in &mut self.tracks {
            track.on_tempo_changed(frames_per_tick);
        }
        bpm
    }

    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut M {
        &mut self.mixer
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id() == id)
    }

    pub fn add_track(&mut self, name: impl Into<String>) -> TrackId {
        let id = TrackId(self.next_track_id);
        self.next_track_id += 1;

        let handle = self.collector.handle();
        let mut track = Track::new(id, &handle, &self.tempo);
        track.set_name(name);
        log::debug!("added track {:?} '{}'", id, track.name());
        self.tracks.push(track);
        id
    }

    /// Remove a track. Its handles are revoked before it is dropped.
    pub fn remove_track(&mut self, id: TrackId) -> bool {
        let Some(index) = self.tracks.iter().position(|t| t.id() == id) else {
            return false;
        };
        let track = self.tracks.remove(index);
        track.destroy(&mut self.mixer);
        true
    }

    /// Run one processing period: every track triggers the clips starting at
    /// `start`. Returns whether any track handed a handle to the mixer.
    pub fn process_period(&mut self, start: Tick, frames: usize, offset: usize) -> bool {
        let mut triggered = false;
        for track in &mut self.tracks {
            triggered |= track.play(start, frames, offset, &mut self.mixer);
        }
        triggered
    }

    /// Tick at which the last clip ends.
    pub fn length(&self) -> Tick {
        self.tracks
            .iter()
            .flat_map(|t| t.clips())
            .map(|c| c.end_position())
            .max()
            .unwrap_or(0)
    }

    pub fn is_modified(&self) -> bool {
        self.tracks.iter().any(Track::is_modified)
    }

    pub fn mark_saved(&mut self) {
        for track in &mut self.tracks {
            track.mark_saved();
        }
    }

    pub fn save(&self) -> Element {
        let mut element = Element::new(SONG_NODE_NAME).with_attribute("bpm", self.tempo.bpm());
        for track in &self.tracks {
            element.append_child(track.save_state());
        }
        element
    }

    /// Replace all tracks with the ones stored in `element`.
    pub fn load(&mut self, element: &Element) -> Result<(), ProjectError> {
        if element.name != SONG_NODE_NAME {
            return Err(ProjectError::UnexpectedElement {
                expected: SONG_NODE_NAME.to_string(),
                found: element.name.clone(),
            });
        }

        for track in self.tracks.drain(..) {
            track.destroy(&mut self.mixer);
        }

        let bpm = match element.attr_f64("bpm") {
            bpm if bpm > 0.0 => bpm,
            _ => DEFAULT_BPM,
        };
        self.tempo.set_bpm(bpm);

        for node in element.children_named(TRACK_NODE_NAME) {
            let id = self.add_track("");
            if let Some(index) = self.tracks.iter().position(|t| t.id() == id) {
                self.tracks[index].load_state(node, &mut self.mixer);
            }
        }
        log::debug!("loaded {} tracks at {} BPM", self.tracks.len(), self.tempo.bpm());
        Ok(())
    }

    pub fn save_to_file(&mut self, path: &Path, format: DocumentFormat) -> Result<(), ProjectError> {
        save_document(path, &self.save(), format)?;
        self.mark_saved();
        Ok(())
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<(), ProjectError> {
        let document = load_document(path)?;
        self.load(&document)
    }
}

impl<M: Mixer> Drop for Arrangement<M> {
    fn drop(&mut self) {
        for track in self.tracks.drain(..) {
            track.destroy(&mut self.mixer);
        }
        self.collector.collect();
    }
}

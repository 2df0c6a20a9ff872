use basedrop::Shared;

use crate::{AudioArc, ClipId, TrackId, VolumeModel};

/// One sounding instance of a clip, handed from a track to the mixer.
///
/// The handle holds basedrop snapshots of the clip's sample data and of the
/// track's volume. When the mixer drops a finished handle on the audio thread the
/// last reference is reclaimed later by the collector, never freed in place.
///
/// Apart from the playback cursor, which the mixer keeps next to the handle, a
/// handle is immutable once built.
pub struct PlayHandle {
    owner: TrackId,
    clip: ClipId,
    audio: Shared<AudioArc>,
    volume: Shared<VolumeModel>,
    offset: usize,
    muted: bool,
}

impl PlayHandle {
    pub fn new(
        owner: TrackId,
        clip: ClipId,
        audio: Shared<AudioArc>,
        volume: Shared<VolumeModel>,
    ) -> Self {
        Self {
            owner,
            clip,
            audio,
            volume,
            offset: 0,
            muted: false,
        }
    }

    /// Frames into the current processing period at which playback begins.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }

    pub fn owner(&self) -> TrackId {
        self.owner
    }

    pub fn clip(&self) -> ClipId {
        self.clip
    }

    pub fn audio(&self) -> &AudioArc {
        &self.audio
    }

    pub fn volume(&self) -> &VolumeModel {
        &self.volume
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn frames(&self) -> usize {
        self.audio.frames()
    }
}

impl std::fmt::Debug for PlayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayHandle")
            .field("owner", &self.owner)
            .field("clip", &self.clip)
            .field("frames", &self.audio.frames())
            .field("offset", &self.offset)
            .field("muted", &self.muted)
            .finish()
    }
}

/// The mixing engine as seen by tracks.
///
/// Tracks hand over play handles and ask for them to be revoked. They never
/// destroy a registered handle themselves.
pub trait Mixer {
    /// Take ownership of `handle`. Returns `false` if the mixer had to drop it.
    fn add_play_handle(&mut self, handle: PlayHandle) -> bool;

    /// Revoke every handle that originated from `owner`.
    fn remove_play_handles(&mut self, owner: TrackId);

    /// Revoke every handle that plays `clip`.
    fn remove_clip_handles(&mut self, clip: ClipId);

    /// Number of handles dropped since the last call, resetting the count.
    /// Mixers that never drop handles keep the default.
    fn take_dropped_handles(&mut self) -> usize {
        0
    }
}

impl<M: Mixer + ?Sized> Mixer for &mut M {
    fn add_play_handle(&mut self, handle: PlayHandle) -> bool {
        (**self).add_play_handle(handle)
    }

    fn remove_play_handles(&mut self, owner: TrackId) {
        (**self).remove_play_handles(owner)
    }

    fn remove_clip_handles(&mut self, clip: ClipId) {
        (**self).remove_clip_handles(clip)
    }

    fn take_dropped_handles(&mut self) -> usize {
        (**self).take_dropped_handles()
    }
}

//! Hooks for an external view layer. The core renders nothing; a front end
//! implements [`ViewFactory`] and asks tracks and clips for their proxies.

use crate::clip::TimelineClip;
use crate::track::Track;

/// The kinds of track a view layer has to be able to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Sample,
}

pub trait ViewFactory {
    type TrackView;
    type ClipView;

    fn track_view(&mut self, kind: TrackKind, track: &Track) -> Self::TrackView;
    fn clip_view(&mut self, clip: &TimelineClip) -> Self::ClipView;
}

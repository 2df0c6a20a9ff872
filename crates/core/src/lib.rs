pub mod arrangement;
pub mod clip;
pub mod fx;
pub mod model;
pub mod sample_buffer;
pub mod tempo;
pub mod track;
pub mod view;

pub use arrangement::{Arrangement, SONG_NODE_NAME};
pub use clip::{
    CLIP_NODE_NAME, DRAG_SAMPLE_DATA, DRAG_SAMPLE_FILE, MIN_CLIP_LENGTH, SaveContext, TimelineClip,
    computed_length,
};
pub use fx::{EffectChain, FxChain};
pub use model::ModelSettings;
pub use sample_buffer::{PortableTextError, SampleBuffer};
pub use tempo::{DEFAULT_BPM, MAX_BPM, MIN_BPM, Tempo, TempoSource};
pub use track::{DEFAULT_TRACK_NAME, TRACK_NODE_NAME, Track};
pub use view::{TrackKind, ViewFactory};

pub use cliptrack_decode::{decode_source, resolve_sample_path, strip_samples_root};
pub use cliptrack_project::{DocumentFormat, Element, ProjectError, load_document, save_document};
pub use cliptrack_transport::{
    AudioArc, ClipId, Mixer, PlayHandle, TICKS_PER_BAR, TICKS_PER_BEAT, Tick, TrackId, VolumeModel,
};

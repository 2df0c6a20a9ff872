use cliptrack_transport::{ClipId, Mixer, PlayHandle, TrackId};

struct Voice {
    handle: PlayHandle,
    cursor: usize,
    started: bool,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.cursor >= self.handle.frames()
    }
}

/// The set of handles currently sounding.
///
/// Storage is allocated once up front, so registering, revoking and mixing
/// never allocate. Handles dropped here only release basedrop references;
/// the memory itself is reclaimed by the collector on the control thread.
pub struct HandleRegistry {
    voices: Vec<Voice>,
    capacity: usize,
}

impl HandleRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            voices: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn register(&mut self, handle: PlayHandle) -> bool {
        if self.voices.len() >= self.capacity {
            return false;
        }
        self.voices.push(Voice {
            handle,
            cursor: 0,
            started: false,
        });
        true
    }

    pub fn revoke_track(&mut self, owner: TrackId) -> usize {
        let before = self.voices.len();
        self.voices.retain(|v| v.handle.owner() != owner);
        before - self.voices.len()
    }

    pub fn revoke_clip(&mut self, clip: ClipId) -> usize {
        let before = self.voices.len();
        self.voices.retain(|v| v.handle.clip() != clip);
        before - self.voices.len()
    }

    /// Mix one period of every voice into `out`, interleaved with `channels`
    /// channels. Voices that run out are dropped. Returns the voices left.
    pub fn process(&mut self, out: &mut [f32], channels: usize) -> usize {
        if channels == 0 {
            return self.voices.len();
        }
        let frames = out.len() / channels;

        for voice in &mut self.voices {
            let first = if voice.started {
                0
            } else {
                voice.started = true;
                voice.handle.offset().min(frames)
            };

            let audio = voice.handle.audio();
            let gain = if voice.handle.is_muted() {
                0.0
            } else {
                voice.handle.volume().gain()
            };
            let available = audio.frames().saturating_sub(voice.cursor);
            let count = (frames - first).min(available);

            if gain != 0.0 {
                for i in 0..count {
                    let (left, right) = audio.stereo_frame(voice.cursor + i);
                    let frame = &mut out[(first + i) * channels..(first + i + 1) * channels];
                    match frame {
                        [mono] => *mono += (left + right) * 0.5 * gain,
                        [l, r, ..] => {
                            *l += left * gain;
                            *r += right * gain;
                        }
                        [] => {}
                    }
                }
            }
            voice.cursor += count;
        }

        self.voices.retain(|v| !v.is_finished());
        self.voices.len()
    }
}

impl Mixer for HandleRegistry {
    fn add_play_handle(&mut self, handle: PlayHandle) -> bool {
        self.register(handle)
    }

    fn remove_play_handles(&mut self, owner: TrackId) {
        self.revoke_track(owner);
    }

    fn remove_clip_handles(&mut self, clip: ClipId) {
        self.revoke_clip(clip);
    }
}

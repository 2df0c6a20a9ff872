pub mod config;
pub mod registry;

use std::time::Duration;

use cliptrack_transport::{ClipId, Mixer, PlayHandle, TrackId};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

pub use config::EngineConfig;
pub use registry::HandleRegistry;

/// Frames mixed per pass inside the output callback.
const MIX_BLOCK_FRAMES: usize = 1024;

pub enum MixerCommand {
    Add(PlayHandle),
    RevokeTrack(TrackId),
    RevokeClip(ClipId),
}

/// Control-thread end of the mixer queue.
///
/// Additions are dropped when the queue is full and counted, so the owner can
/// report them outside the processing path. Revocations wait for room, since
/// losing one would leave a handle playing data its owner has released.
pub struct MixerLink {
    commands: rtrb::Producer<MixerCommand>,
    dropped: usize,
}

impl MixerLink {
    fn push_reliable(&mut self, mut command: MixerCommand) {
        loop {
            match self.commands.push(command) {
                Ok(()) => return,
                Err(rtrb::PushError::Full(rejected)) => {
                    if self.commands.is_abandoned() {
                        return;
                    }
                    command = rejected;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
        }
    }
}

impl Mixer for MixerLink {
    fn add_play_handle(&mut self, handle: PlayHandle) -> bool {
        match self.commands.push(MixerCommand::Add(handle)) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(_)) => {
                self.dropped += 1;
                false
            }
        }
    }

    fn remove_play_handles(&mut self, owner: TrackId) {
        self.push_reliable(MixerCommand::RevokeTrack(owner));
    }

    fn remove_clip_handles(&mut self, clip: ClipId) {
        self.push_reliable(MixerCommand::RevokeClip(clip));
    }

    fn take_dropped_handles(&mut self) -> usize {
        std::mem::take(&mut self.dropped)
    }
}

/// Audio-thread end of the mixer queue.
pub struct MixerReceiver {
    commands: rtrb::Consumer<MixerCommand>,
}

impl MixerReceiver {
    /// Apply queued commands in order. Returns how many were applied.
    pub fn apply(&mut self, registry: &mut HandleRegistry) -> usize {
        let mut applied = 0;
        while let Ok(command) = self.commands.pop() {
            match command {
                MixerCommand::Add(handle) => {
                    registry.register(handle);
                }
                MixerCommand::RevokeTrack(owner) => {
                    registry.revoke_track(owner);
                }
                MixerCommand::RevokeClip(clip) => {
                    registry.revoke_clip(clip);
                }
            }
            applied += 1;
        }
        applied
    }
}

pub fn mixer_queue(capacity: usize) -> (MixerLink, MixerReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::<MixerCommand>::new(capacity);
    (
        MixerLink {
            commands: producer,
            dropped: 0,
        },
        MixerReceiver { commands: consumer },
    )
}

/// A running output stream. Dropping it stops playback.
pub struct EngineHandle {
    mixer: MixerLink,
    sample_rate: u32,
    channels: u16,
    _stream: cpal::Stream,
}

impl EngineHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Mixer for EngineHandle {
    fn add_play_handle(&mut self, handle: PlayHandle) -> bool {
        self.mixer.add_play_handle(handle)
    }

    fn remove_play_handles(&mut self, owner: TrackId) {
        self.mixer.remove_play_handles(owner);
    }

    fn remove_clip_handles(&mut self, clip: ClipId) {
        self.mixer.remove_clip_handles(clip);
    }

    fn take_dropped_handles(&mut self) -> usize {
        self.mixer.take_dropped_handles()
    }
}

pub fn start(config: &EngineConfig) -> anyhow::Result<EngineHandle> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let supported = choose_output_config(&device, config)?;
    let stream_config: cpal::StreamConfig = supported.config();
    log::info!(
        "opening output at {} Hz, {} channels",
        stream_config.sample_rate.0,
        stream_config.channels
    );

    let (link, receiver) = mixer_queue(config.command_capacity);
    let registry = HandleRegistry::with_capacity(config.max_play_handles);

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, receiver, registry)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, receiver, registry)?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };
    stream.play()?;

    Ok(EngineHandle {
        mixer: link,
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
        _stream: stream,
    })
}

fn choose_output_config(
    device: &cpal::Device,
    config: &EngineConfig,
) -> anyhow::Result<cpal::SupportedStreamConfig> {
    let wanted = cpal::SampleRate(config.sample_rate);
    let matching = device.supported_output_configs()?.find(|range| {
        range.channels() == config.channels
            && range.sample_format() == cpal::SampleFormat::F32
            && range.min_sample_rate() <= wanted
            && wanted <= range.max_sample_rate()
    });
    match matching {
        Some(range) => Ok(range.with_sample_rate(wanted)),
        None => {
            let fallback = device.default_output_config()?;
            log::warn!(
                "output device can't do {} Hz with {} channels, using {:?}",
                config.sample_rate,
                config.channels,
                fallback
            );
            Ok(fallback)
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut receiver: MixerReceiver,
    mut registry: HandleRegistry,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch = vec![0.0f32; MIX_BLOCK_FRAMES * channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            receiver.apply(&mut registry);

            for block in data.chunks_mut(scratch.len().max(1)) {
                let mix = &mut scratch[..block.len()];
                mix.fill(0.0);
                registry.process(mix, channels);
                for (out, sample) in block.iter_mut().zip(mix.iter()) {
                    *out = T::from_sample(*sample);
                }
            }
        },
        |err| log::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

use std::fs::File;
use std::path::{Path, PathBuf};

use cliptrack_transport::AudioArc;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

const SAMPLES_ROOT: &str = "samples";

/// Resolve a sample source identifier to an existing file.
/// Accepts paths relative to the samples root (e.g., `drums/kick.wav`)
/// or paths that already include it (e.g., `samples/drums/kick.wav`).
pub fn resolve_sample_path(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let with_root = Path::new(SAMPLES_ROOT).join(path);
    if with_root.exists() {
        return Some(with_root);
    }

    None
}

/// Strip the samples root prefix from a path if present.
/// Use this before storing a source identifier in a document.
pub fn strip_samples_root(path: &Path) -> PathBuf {
    path.strip_prefix(SAMPLES_ROOT)
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Decode the sample named by `source` and resample it to `sample_rate`.
pub fn decode_source(source: &str, sample_rate: u32) -> anyhow::Result<AudioArc> {
    let audio = decode_file(Path::new(source))?;
    let resampled = audio.resample(sample_rate)?;
    log::debug!(
        "decoded '{}': {} frames at {} Hz",
        source,
        resampled.frames(),
        sample_rate
    );
    Ok(resampled)
}

pub fn decode_file(path: &Path) -> anyhow::Result<AudioArc> {
    let resolved = resolve_sample_path(path)
        .ok_or_else(|| anyhow::anyhow!("sample not found: {}", path.display()))?;
    decode_file_direct(&resolved)
}

pub fn decode_file_direct(path: &Path) -> anyhow::Result<AudioArc> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(e) => match classify(&e) {
                PacketFailure::EndOfStream => break,
                PacketFailure::Skip => {
                    skipped += 1;
                    continue;
                }
                PacketFailure::Fatal => return Err(e.into()),
            },
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => match classify(&e) {
                PacketFailure::EndOfStream => break,
                PacketFailure::Skip => {
                    skipped += 1;
                    continue;
                }
                PacketFailure::Fatal => return Err(e.into()),
            },
        };

        // reuse the interleaving buffer until a packet outgrows it
        let spec = *decoded.spec();
        let frames = decoded.capacity();
        let needed = frames * spec.channels.count();
        if sample_buf.as_ref().is_none_or(|buf| buf.capacity() < needed) {
            sample_buf = Some(SampleBuffer::new(frames as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if skipped > 0 {
        log::warn!("skipped {} undecodable packets in {}", skipped, path.display());
    }
    if channels == 0 || samples.len() % channels as usize != 0 {
        anyhow::bail!("decoded sample count does not match channel layout");
    }

    Ok(AudioArc::new(samples, sample_rate, channels))
}

#[derive(Debug, PartialEq, Eq)]
enum PacketFailure {
    EndOfStream,
    /// Corrupt packet; the rest of the stream is still usable.
    Skip,
    Fatal,
}

fn classify(error: &SymphoniaError) -> PacketFailure {
    match error {
        SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            PacketFailure::EndOfStream
        }
        SymphoniaError::DecodeError(_) => PacketFailure::Skip,
        _ => PacketFailure::Fatal,
    }
}

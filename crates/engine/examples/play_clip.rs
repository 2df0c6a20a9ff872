use std::path::Path;
use std::time::Duration;

use cliptrack_core::{Arrangement, Tempo, TempoSource};
use cliptrack_engine::EngineConfig;

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: play_clip <sample file>"))?;

    let engine = cliptrack_engine::start(&EngineConfig::load_default())?;
    println!("Output: {} Hz, {} channels", engine.sample_rate(), engine.channels());

    let tempo = Tempo::new(120.0, engine.sample_rate());
    let mut arrangement = Arrangement::new(engine, tempo);
    let track = arrangement.add_track("Preview");
    let length = {
        let track = arrangement
            .track_mut(track)
            .ok_or_else(|| anyhow::anyhow!("track vanished"))?;
        let clip = track.insert_clip(0);
        clip.set_source(&Path::new(&path).to_string_lossy());
        println!("Loaded {} frames from {}", clip.buffer().frames(), clip.sample_source());
        clip.length()
    };

    arrangement.process_period(0, 256, 0);

    let seconds = arrangement.tempo().ticks_to_seconds(length);
    let frames_per_tick = arrangement.tempo().frames_per_tick();
    println!("Playing {length} ticks ({seconds:.2}s, {frames_per_tick:.1} frames per tick)");
    std::thread::sleep(Duration::from_secs_f64(seconds));

    arrangement.collect();
    Ok(())
}

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use serde::Serialize;
use std::path::PathBuf;

use beat_lanes::audio::decode_file;
use beat_lanes::config;
use beat_lanes::game::{FieldLayout, MemoryHighScoreStore, TileEngine};
use beat_lanes::pitch::{Mode, PitchPipeline, PitchSlot};
use beat_lanes::tempo::{OnsetTempoEstimator, TempoEstimator};

#[derive(Parser)]
#[command(name = "pitch-trace")]
#[command(about = "Run the pitch pipeline over a file without a window")]
struct Args {
    /// Audio file to trace (MP3, WAV, FLAC, OGG, M4A)
    #[arg()]
    input_file: PathBuf,

    /// Simulated display refresh rate
    #[arg(long, default_value = "60")]
    fps: u32,

    /// Pitch gate sensitivity, 0.0 to 1.0
    #[arg(long)]
    sensitivity: Option<f32>,

    /// Pitch aggregation window in seconds (0.1 to 0.3)
    #[arg(long)]
    complexity: Option<f32>,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write every frame to this JSON file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Serialize)]
struct TraceFrame {
    time_ms: f64,
    mode: Mode,
    vocal_energy: f32,
    high_energy: f32,
    frequency_hz: Option<f32>,
    note: Option<String>,
    is_vocal: bool,
}

#[derive(Serialize)]
struct Trace {
    file_name: String,
    sample_rate: u32,
    duration_secs: f32,
    bpm: Option<f32>,
    tiles_spawned: usize,
    frames: Vec<TraceFrame>,
}

#[tokio::main]
async fn main() -> Result<()> {
    beat_lanes::init_logging();
    let args = Args::parse();

    let mut config = config::resolve(args.config.as_deref())?;
    config.apply_overrides(args.sensitivity, args.complexity, None);
    let fps = args.fps.max(1);

    info!("Pitch trace of {}", args.input_file.display());
    info!(
        "{} fps, sensitivity {:.2}, window {:.2}s",
        fps, config.game.sensitivity, config.game.complexity
    );

    let path = args.input_file.clone();
    let audio = tokio::task::spawn_blocking(move || decode_file(&path))
        .await
        .context("Decode task failed")?
        .with_context(|| format!("Failed to decode {}", args.input_file.display()))?;

    let bpm = match OnsetTempoEstimator::new()
        .estimate(&audio.mono, audio.sample_rate)
        .await
    {
        Ok(bpm) => Some(bpm.round()),
        Err(e) => {
            warn!("Tempo: {}", e);
            None
        }
    };

    let mut pipeline = PitchPipeline::new(audio.sample_rate, config.game.sensitivity, PitchSlot::new());
    let mut engine = TileEngine::new(FieldLayout::default(), Box::new(MemoryHighScoreStore::default()));
    engine.set_complexity(config.game.complexity);
    engine.start();

    let frame_ms = 1000.0 / fps as f64;
    let samples_per_frame = audio.sample_rate as f64 / fps as f64;
    let total_frames = (audio.mono.len() as f64 / samples_per_frame) as usize;

    let mut frames = Vec::with_capacity(if args.output.is_some() { total_frames } else { 0 });
    let mut tiles_spawned = 0;
    let mut voiced_frames = 0usize;

    for i in 0..total_frames {
        let now_ms = i as f64 * frame_ms;
        let position = ((i + 1) as f64 * samples_per_frame) as usize;

        let latest = pipeline.slot().latest();
        if engine.tick(latest.as_ref(), now_ms).spawned.is_some() {
            tiles_spawned += 1;
        }

        let tracked = pipeline.run(&audio.mono, position, now_ms);
        if tracked.decision.switched {
            info!("{:>8.0}ms  mode -> {:?}", now_ms, tracked.decision.mode);
        }
        if let Some(sample) = &tracked.sample {
            debug!(
                "{:>8.0}ms  {:>7.1} Hz  {:<4} {}",
                now_ms,
                sample.frequency_hz,
                sample.note,
                if sample.is_vocal { "vocal" } else { "mix" }
            );
            voiced_frames += 1;
        }

        if args.output.is_some() {
            frames.push(TraceFrame {
                time_ms: now_ms,
                mode: tracked.decision.mode,
                vocal_energy: tracked.decision.vocal_energy,
                high_energy: tracked.decision.high_energy,
                frequency_hz: tracked.sample.as_ref().map(|s| s.frequency_hz),
                note: tracked.sample.as_ref().map(|s| s.note.clone()),
                is_vocal: tracked.sample.as_ref().map_or(false, |s| s.is_vocal),
            });
        }
    }

    info!("=== TRACE RESULTS ===");
    info!("Duration: {:.2}s over {} frames", audio.duration_secs(), total_frames);
    match bpm {
        Some(bpm) => info!("Tempo: {} BPM", bpm),
        None => info!("Tempo: not detected"),
    }
    info!(
        "Frames with pitch: {} ({:.1}%)",
        voiced_frames,
        100.0 * voiced_frames as f32 / total_frames.max(1) as f32
    );
    info!("Tiles spawned: {}", tiles_spawned);

    if let Some(output) = &args.output {
        let trace = Trace {
            file_name: audio.file_name.clone(),
            sample_rate: audio.sample_rate,
            duration_secs: audio.duration_secs(),
            bpm,
            tiles_spawned,
            frames,
        };
        let json = serde_json::to_string_pretty(&trace)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("Trace written to {}", output.display());
    }

    Ok(())
}

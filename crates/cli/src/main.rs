use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use player::sim::{SimClock, SimMediaFactory};
use player::{PlayerConfig, PlayerEvent, ScenePlayer};
use timeline::{
    compute_timeline, marker_spans, total_duration_ms, AudioTrack, MeasuredDurations, Scene, Shot,
    ShotVideo, FALLBACK_DURATION_MS,
};

#[derive(Parser)]
#[command(name = "storyreel-cli")]
#[command(about = "Storyreel - Headless scene timeline inspection and playback simulation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter scene file with demo shots and a score track
    New {
        /// Scene name
        name: String,

        /// Output file path (defaults to <name>.scene.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the derived timeline for a scene file
    Inspect {
        /// Scene file path
        scene: PathBuf,

        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Simulate playback of a scene and print the event stream
    Play {
        /// Scene file path
        scene: PathBuf,

        /// Start position on the scene clock, in milliseconds
        #[arg(long, default_value = "0")]
        from_ms: u64,

        /// Simulated tick interval, in milliseconds
        #[arg(long, default_value = "25")]
        step_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    match cli.command {
        Commands::New { name, output } => new_command(name, output),
        Commands::Inspect { scene, json } => inspect_command(scene, json),
        Commands::Play {
            scene,
            from_ms,
            step_ms,
        } => play_command(scene, from_ms, step_ms),
    }
}

/// Scene files carry a small envelope around the playback contract, but a
/// bare scene object is accepted too.
#[derive(Deserialize)]
struct SceneFile {
    scene: Scene,
}

fn load_scene(path: &Path) -> Result<Scene> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("read scene file {}", path.display()))?;
    if let Ok(file) = serde_json::from_str::<SceneFile>(&raw) {
        return Ok(file.scene);
    }
    serde_json::from_str::<Scene>(&raw)
        .with_context(|| format!("parse scene file {}", path.display()))
}

fn new_command(name: String, output: Option<PathBuf>) -> Result<()> {
    let path = output.unwrap_or_else(|| PathBuf::from(format!("{name}.scene.json")));

    let mut scene = Scene::new(name.as_str());
    let mut opening = Shot::new(0);
    opening.prompt = Some("Establishing shot, slow push-in".to_string());
    opening.video = ShotVideo::Completed {
        url: "shots/shot-01.mp4".to_string(),
        duration_ms: Some(5000),
        thumbnail_url: None,
    };
    scene.shots.push(opening);

    let mut reverse = Shot::new(1);
    reverse.prompt = Some("Reverse angle on the protagonist".to_string());
    reverse.video = ShotVideo::Completed {
        url: "shots/shot-02.mp4".to_string(),
        duration_ms: Some(4000),
        thumbnail_url: None,
    };
    reverse.trim_start_ms = 500;
    scene.shots.push(reverse);

    scene
        .audio_tracks
        .push(AudioTrack::new("audio/score.mp3", 1000, 6000));

    let document = serde_json::json!({
        "name": name,
        "created": chrono::Utc::now().to_rfc3339(),
        "version": "1.0.0",
        "scene": scene,
    });
    std::fs::write(&path, serde_json::to_string_pretty(&document)?)
        .with_context(|| format!("write scene file {}", path.display()))?;

    info!("Scene created: {}", path.display());
    Ok(())
}

fn inspect_command(path: PathBuf, as_json: bool) -> Result<()> {
    let scene = load_scene(&path)?;
    let playable = scene.playable_shots();
    let entries = compute_timeline(&playable, &MeasuredDurations::new(), FALLBACK_DURATION_MS);
    let total = total_duration_ms(&entries);
    let spans = marker_spans(&entries);

    if scene.shots.len() != playable.len() {
        warn!(
            "{} of {} shots are not playable yet and were left off the timeline",
            scene.shots.len() - playable.len(),
            scene.shots.len()
        );
    }

    if as_json {
        let doc = serde_json::json!({
            "name": scene.name,
            "total_duration_ms": total,
            "entries": entries.iter().map(|e| serde_json::json!({
                "shot_id": e.shot_id,
                "url": e.url,
                "start_ms": e.start_ms,
                "end_ms": e.end_ms,
                "duration_ms": e.duration_ms,
                "trim_start_ms": e.trim_start_ms,
                "trim_end_ms": e.trim_end_ms,
                "base_duration_ms": e.base_duration_ms,
            })).collect::<Vec<_>>(),
            "audio_tracks": scene.audio_tracks,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Scene: {}  ({} ms total)", scene.name, total);
    println!("{:<4} {:>9} {:>9} {:>9} {:>7}  url", "#", "start", "end", "dur", "width");
    for (entry, span) in entries.iter().zip(&spans) {
        println!(
            "{:<4} {:>9} {:>9} {:>9} {:>6.1}%  {}",
            span.index,
            entry.start_ms,
            entry.end_ms,
            entry.duration_ms,
            span.width * 100.0,
            entry.url
        );
    }
    if !scene.audio_tracks.is_empty() {
        println!("Audio tracks:");
        for track in &scene.audio_tracks {
            println!(
                "  [{} .. {}) vol {:.2}{}  {}",
                track.start_time_ms,
                track.end_time_ms(),
                track.volume,
                if track.muted { " (muted)" } else { "" },
                track.source_url
            );
        }
    }
    Ok(())
}

fn play_command(path: PathBuf, from_ms: u64, step_ms: u64) -> Result<()> {
    let scene = load_scene(&path)?;
    let step_ms = step_ms.max(1);

    let clock = SimClock::new();
    let factory = SimMediaFactory::new(clock.clone());
    for shot in scene.playable_shots() {
        if let Some(url) = shot.video.playable_url() {
            let base_ms = shot
                .video
                .stored_duration_ms()
                .unwrap_or(FALLBACK_DURATION_MS);
            factory.set_duration(url, base_ms as f64 / 1000.0);
        }
    }
    for track in &scene.audio_tracks {
        let base_ms = track
            .original_duration_ms
            .unwrap_or(track.trim_start_ms + track.duration_ms + track.trim_end_ms);
        factory.set_duration(track.source_url.clone(), base_ms as f64 / 1000.0);
    }

    let mut player = ScenePlayer::new(PlayerConfig::default(), Arc::new(factory));
    let events = player.events();
    player.set_scene(&scene);

    let total = player.total_duration_ms();
    if total == 0 {
        warn!("scene has no playable content, nothing to simulate");
        return Ok(());
    }

    info!(
        "Simulating '{}': {} shots, {} ms total, {} ms ticks",
        scene.name,
        player.entries().len(),
        total,
        step_ms
    );

    if from_ms > 0 {
        player.seek_to_ms(from_ms);
    }
    player.play();

    // Bound the simulated wall time so a stalled scene cannot loop forever.
    let max_ticks = (total / step_ms + 2000 / step_ms + 2) as usize;
    let mut reached_end = false;
    'sim: for _ in 0..max_ticks {
        clock.advance(step_ms as f64 / 1000.0);
        player.tick();
        for event in events.try_iter() {
            print_event(&event);
            if event == PlayerEvent::ReachedEnd {
                reached_end = true;
                break 'sim;
            }
        }
    }

    if reached_end {
        info!("Simulation finished at {} ms", player.global_time_ms());
    } else {
        warn!(
            "Simulation stopped at {} ms without reaching the end",
            player.global_time_ms()
        );
    }
    Ok(())
}

fn print_event(event: &PlayerEvent) {
    match event {
        PlayerEvent::PlaybackStarted => info!("playback started"),
        PlayerEvent::PlaybackPaused => info!("playback paused"),
        PlayerEvent::ShotChanged { index } => info!("shot changed -> {}", index),
        PlayerEvent::TimelineRecomputed { total_duration_ms } => {
            info!("timeline recomputed, total {} ms", total_duration_ms)
        }
        PlayerEvent::ReachedEnd => info!("reached end of scene"),
        PlayerEvent::VideoError { message } => warn!("video error: {}", message),
        PlayerEvent::TimeChanged { .. } => {} // one per tick, too chatty to print
    }
}

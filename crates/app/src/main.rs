use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use media_sync_core::{
    auto_sync, build_sync_point_markers, to_flat_sync_points, FlatSyncPoint, SampleBuffers,
    ScoreTimeline, SilenceConfig,
};
use tracing_subscriber::EnvFilter;

fn main() -> media_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            score,
            sync_points,
            output,
        } => run_build(&score, sync_points.as_deref(), &output),
        Commands::Autosync {
            score,
            audio,
            sample_rate,
            pad_to_audio,
            output,
        } => run_autosync(&score, audio.as_deref(), sample_rate, pad_to_audio, &output),
    }
}

fn run_build(
    score: &Path,
    sync_points: Option<&Path>,
    output: &Path,
) -> media_sync_core::Result<()> {
    tracing::info!(?score, ?output, "building sync point markers");

    let timeline = load_timeline(score)?;
    let persisted = match sync_points {
        Some(path) => load_sync_points(path)?,
        None => Vec::new(),
    };
    let info = build_sync_point_markers(&timeline, &persisted, SampleBuffers::default())?;
    tracing::info!(
        markers = info.markers.len(),
        end_time_ms = info.end_time,
        "marker sequence built"
    );

    let json = serde_json::to_string_pretty(&info.markers)?;
    std::fs::write(output, json)?;
    Ok(())
}

fn run_autosync(
    score: &Path,
    audio: Option<&Path>,
    sample_rate: u32,
    pad_to_audio: bool,
    output: &Path,
) -> media_sync_core::Result<()> {
    tracing::info!(?score, ?audio, pad_to_audio, "running auto-sync");

    let timeline = load_timeline(score)?;
    let buffers = match audio {
        Some(path) => load_raw_samples(path, sample_rate)?,
        None => SampleBuffers::default(),
    };
    let info = auto_sync(&timeline, buffers, pad_to_audio, &SilenceConfig::default())?;
    let flat = to_flat_sync_points(&info);
    tracing::info!(
        anchors = flat.len(),
        end_time_ms = info.end_time,
        "auto-sync complete"
    );

    let json = serde_json::to_string_pretty(&flat)?;
    std::fs::write(output, json)?;
    Ok(())
}

fn load_timeline(path: &Path) -> media_sync_core::Result<ScoreTimeline> {
    let file = File::open(path)?;
    ScoreTimeline::from_json_reader(BufReader::new(file))
}

fn load_sync_points(path: &Path) -> media_sync_core::Result<Vec<FlatSyncPoint>> {
    let file = File::open(path)?;
    let points: Vec<FlatSyncPoint> = serde_json::from_reader(BufReader::new(file))?;
    Ok(points)
}

/// Reads raw interleaved-stereo little-endian `f32` samples. Decoding
/// compressed audio is the host's job; this entry point only accepts
/// already-decoded PCM.
fn load_raw_samples(path: &Path, sample_rate: u32) -> media_sync_core::Result<SampleBuffers> {
    let bytes = std::fs::read(path)?;
    let mut left = Vec::with_capacity(bytes.len() / 8);
    let mut right = Vec::with_capacity(bytes.len() / 8);
    for (index, chunk) in bytes.chunks_exact(4).enumerate() {
        let sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if index % 2 == 0 {
            left.push(sample);
        } else {
            right.push(sample);
        }
    }
    Ok(SampleBuffers::new(sample_rate, left, right))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Score/media synchronization toolkit", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the full marker sequence from a score timeline and its
    /// persisted sync points.
    Build {
        /// Path to the score timeline JSON.
        score: PathBuf,
        /// Optional JSON list of persisted sync points.
        #[arg(short, long)]
        sync_points: Option<PathBuf>,
        /// Output path for the marker sequence JSON.
        output: PathBuf,
    },
    /// Propose an alignment from the tempo map, optionally padded to
    /// the non-silent span of a recording.
    Autosync {
        /// Path to the score timeline JSON.
        score: PathBuf,
        /// Raw interleaved-stereo f32le sample file.
        #[arg(short, long)]
        audio: Option<PathBuf>,
        /// Sample rate of the raw audio file.
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        /// Stretch the proposed sequence onto the detected non-silent
        /// audio span.
        #[arg(long)]
        pad_to_audio: bool,
        /// Output path for the flattened sync point JSON.
        output: PathBuf,
    },
}

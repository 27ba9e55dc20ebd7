//! `form_replay` binary: runs recorded landmark streams through the analysis engine.
//!
//! # Usage
//!
//! ```bash
//! form_replay --exercise squat session1.jsonl session2.jsonl
//! form_replay --exercise deadlift --config thresholds.json --max-frames 900 lift.jsonl
//! form_replay --list
//! ```
//!
//! Each input file holds one JSON object per line, either a full `JointFrame`
//! (`frame_index`, `timestamp`, `joints`) or a raw pose-model record
//! (`frame_index`, `timestamp`, `landmarks` as 33 `[x, y, z, visibility]` rows).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use form_vision::parallel_pipeline::{AnalysisJob, SessionPool};
use form_vision::{AnalysisConfig, ExerciseType, JointFrame};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "form_replay",
    version,
    about = "Counts reps and scores form in recorded pose-landmark streams",
    long_about = None
)]
struct Args {
    /// Exercise performed in every input file (see `--list`).
    #[arg(short, long, required_unless_present = "list")]
    exercise: Option<String>,

    /// Path to a JSON configuration file. Missing fields keep their defaults.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stop reading each file after this many frames.
    #[arg(long, value_name = "N")]
    max_frames: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the supported exercises and exit.
    #[arg(long, default_value_t = false)]
    list: bool,

    /// JSON-lines landmark recordings.
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

/// One line of a recording.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordedFrame {
    Landmarks {
        frame_index: u64,
        timestamp: f64,
        landmarks: Vec<[f64; 4]>,
    },
    Joints(JointFrame),
}

impl From<RecordedFrame> for JointFrame {
    fn from(record: RecordedFrame) -> Self {
        match record {
            RecordedFrame::Landmarks {
                frame_index,
                timestamp,
                landmarks,
            } => JointFrame::from_landmarks(frame_index, timestamp, &landmarks),
            RecordedFrame::Joints(frame) => frame,
        }
    }
}

fn parse_frames(contents: &str, source: &Path, max_frames: Option<usize>) -> anyhow::Result<Vec<JointFrame>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .take(max_frames.unwrap_or(usize::MAX))
        .map(|(number, line)| {
            serde_json::from_str::<RecordedFrame>(line)
                .map(JointFrame::from)
                .with_context(|| format!("{}:{}: malformed frame", source.display(), number + 1))
        })
        .collect()
}

async fn read_frames(path: &Path, max_frames: Option<usize>) -> anyhow::Result<Vec<JointFrame>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read recording {}", path.display()))?;
    parse_frames(&contents, path, max_frames)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            AnalysisConfig::from_json(path).context("failed to load configuration")
        }
        None => Ok(AnalysisConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .init();

    if args.list {
        let catalog: Vec<_> = ExerciseType::ALL.iter().map(|exercise| exercise.info()).collect();
        println!("{}", serde_json::to_string_pretty(&catalog)?);
        return Ok(());
    }

    let selector = args.exercise.as_deref().unwrap_or_default();
    let exercise: ExerciseType = selector.parse().context("use --list to see supported exercises")?;
    let config = load_config(args.config.as_deref())?;
    if args.files.is_empty() {
        bail!("no recordings given");
    }

    info!("form_vision v{} replaying {} file(s) as {}", form_vision::VERSION, args.files.len(), exercise);

    let mut jobs = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let frames = read_frames(path, args.max_frames).await?;
        if frames.is_empty() {
            warn!("{} contains no frames", path.display());
        }
        jobs.push(AnalysisJob::new(exercise, frames));
    }

    let pool = SessionPool::new(config).context("failed to start the analysis pool")?;
    let reports = pool.analyze_all(jobs).await;

    for (path, report) in args.files.iter().zip(reports) {
        let report = report.with_context(|| format!("analysis of {} failed", path.display()))?;
        let output = serde_json::json!({
            "file": path.display().to_string(),
            "report": report,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

//! Replays a recorded pose stream through one analysis session.
//!
//! Input is JSON lines, one frame per line:
//! `{"timestamp_ms": 33, "landmarks": [{"x": 0.5, "y": 0.4, "visibility": 0.9}, ...]}`
//!
//! ```bash
//! posecoach-replay --exercise squat recording.jsonl
//! RUST_LOG=posecoach=debug posecoach-replay -c posecoach.toml recording.jsonl
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use posecoach::{AnalysisEngine, Config, Landmark, LandmarkPassthrough, Pose};

#[derive(Parser, Debug)]
#[command(name = "posecoach-replay", version = posecoach::GIT_VERSION, about = "Replay recorded pose landmarks through the analysis engine")]
struct Args {
    /// JSON-lines pose recording
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Exercise name (squat, push_up, ...)
    #[arg(short, long, default_value = "squat")]
    exercise: String,

    /// TOML config; defaults are used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "replay")]
    user: String,

    /// Print every frame result, not just the summary
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
struct RecordedFrame {
    timestamp_ms: u64,
    landmarks: Vec<Landmark>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    tracing::info!("posecoach-replay ({})", posecoach::GIT_VERSION);

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let engine = AnalysisEngine::new(config, LandmarkPassthrough)?;

    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open {}", args.input.display()))?;
    let reader = BufReader::new(file);

    let mut frames = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", n + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(&line)
            .with_context(|| format!("Invalid frame on line {}", n + 1))?;
        frames.push(frame);
    }

    let start_ms = frames.first().map_or(0, |f| f.timestamp_ms);
    let session = engine.start_session_at(&args.user, &args.exercise, start_ms)?;

    for frame in frames {
        let result = engine.submit_frame(session, Pose::new(frame.landmarks), frame.timestamp_ms)?;
        if args.verbose {
            if let Some(result) = result {
                println!(
                    "{:>8} ms  {:<11} reps={:<3} score={:5.1}{}",
                    result.timestamp_ms,
                    result.phase.as_str(),
                    result.rep_count,
                    result.form_score,
                    if result.from_cache { "  (cached)" } else { "" }
                );
            }
        }
    }

    let analysis = engine.analysis(session)?;
    let summary = engine.end_session(session)?;
    let stats = engine.performance_stats();

    let report = serde_json::json!({
        "summary": summary,
        "analysis": analysis,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

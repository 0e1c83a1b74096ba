use anyhow::{Context, Result};
use std::env;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use trail_vision::control::{self, ControlCommand, ControlOutcome};
use trail_vision::{FrameSource, ImageSequenceSource, SharedParameters, TrailConfig, TrailPipeline};

/// Pacing between frames, matching the key-wait of the interactive viewer.
const FRAME_INTERVAL: Duration = Duration::from_millis(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("Usage: trail_tester <input_dir> <output_dir> [config.toml]");
        return Ok(());
    }
    let input_dir = PathBuf::from(&args[1]);
    let output_dir = PathBuf::from(&args[2]);
    let config = match args.get(3) {
        Some(path) => TrailConfig::load(path).with_context(|| format!("loading configuration from {path}"))?,
        None => TrailConfig::default(),
    };
    let (initial_params, pipeline_config) = config.into_parts();

    // --- 2. Frame Source & Output Initialization ---
    // A source that cannot be opened is fatal before the loop starts.
    let mut source = ImageSequenceSource::open(&input_dir)
        .with_context(|| format!("opening frame source {}", input_dir.display()))?;
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    // --- 3. Pipeline & Control Initialization ---
    let params = SharedParameters::new(initial_params);
    let mut pipeline = TrailPipeline::new(pipeline_config);
    let (tx, mut commands) = mpsc::channel::<ControlCommand>(32);
    // Detached OS thread, so a pending stdin read does not hold up exit.
    thread::spawn(move || read_commands(tx));

    tracing::info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        mode = ?pipeline.mode(),
        "starting; type `s` to toggle logging, `q` to stop"
    );

    // --- 4. Main Processing Loop ---
    let stream_start = Instant::now();
    let mut ticker = tokio::time::interval(FRAME_INTERVAL);
    let mut index: u64 = 0;
    'frames: loop {
        ticker.tick().await;

        // Commands are applied at the frame boundary only.
        while let Ok(command) = commands.try_recv() {
            if control::apply(command, &params, &mut pipeline) == ControlOutcome::Stop {
                tracing::info!("stop requested");
                break 'frames;
            }
        }

        let frame = match source.read_next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(frames = index, "end of stream");
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "frame read failed, stopping");
                break;
            }
        };

        // --- 5. Pipeline Processing ---
        let snapshot = params.snapshot();
        let report = pipeline.run(&frame, &snapshot, stream_start.elapsed());

        // --- 6. Visualization ---
        report
            .render(&frame)
            .save(&output_dir, index)
            .with_context(|| format!("writing render outputs for frame {index}"))?;
        index += 1;
    }

    pipeline.close_log().context("closing the log session")?;
    tracing::info!(frames = pipeline.frames_processed(), "done");
    Ok(())
}

/// Forwards parsed stdin lines to the processing loop until stdin closes or the
/// loop goes away. Runs on its own OS thread.
fn read_commands(tx: mpsc::Sender<ControlCommand>) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(error = %err, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ControlCommand>() {
            Ok(command) => {
                if tx.blocking_send(command).is_err() {
                    break;
                }
            }
            Err(err) => tracing::warn!(%err, "ignoring input"),
        }
    }
}

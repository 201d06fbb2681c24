use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use location_foreground_rs::{
    dispatch_loop, location_loop, BatchSink, FlushOutcome, IngestionPipeline, JsonLinesSink,
    RawSample, ReaderSource, SmoothingMode, TrackerConfig, LOCATION_INTERVAL,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Smoothing {
    Off,
    Raw,
    Admitted,
}

impl From<Smoothing> for SmoothingMode {
    fn from(value: Smoothing) -> Self {
        match value {
            Smoothing::Off => SmoothingMode::Off,
            Smoothing::Raw => SmoothingMode::RawStream,
            Smoothing::Admitted => SmoothingMode::AdmittedStream,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "location_foreground")]
#[command(about = "Curate a raw location stream into batched backend events", long_about = None)]
struct Args {
    /// JSON config file (defaults used when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Raw fixes as JSON lines (stdin when omitted)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Batch payloads as JSON lines (stdout when omitted)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Pace input at this period; 0 replays as fast as the pipeline accepts
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Treat input as a live feed: wall-clock staleness, 30 s pacing by default
    #[arg(long, default_value_t = false)]
    live: bool,

    #[arg(long)]
    company_id: Option<String>,

    #[arg(long)]
    user_id: Option<String>,

    #[arg(long)]
    battery_level: Option<String>,

    /// Position filter placement
    #[arg(long, value_enum)]
    smoothing: Option<Smoothing>,
}

fn load_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    if let Some(company_id) = &args.company_id {
        config.identity.company_id = company_id.clone();
    }
    if let Some(user_id) = &args.user_id {
        config.identity.user_id = user_id.clone();
    }
    if let Some(battery_level) = &args.battery_level {
        config.identity.battery_level = battery_level.clone();
    }
    if let Some(smoothing) = args.smoothing {
        config.filter.smoothing = smoothing.into();
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    let period = match (args.interval_ms, args.live) {
        (Some(ms), _) => Duration::from_millis(ms),
        (None, true) => LOCATION_INTERVAL,
        (None, false) => Duration::ZERO,
    };

    log::info!("Location foreground tracker starting");
    log::info!("  Company/User: {}/{}", config.identity.company_id, config.identity.user_id);
    log::info!("  Smoothing: {:?}", config.filter.smoothing);
    log::info!("  Batch size: {}", config.batch.batch_size);
    log::info!("  Pacing: {:?} ({})", period, if args.live { "live" } else { "replay" });

    let (mut pipeline, batch_rx) = IngestionPipeline::with_channel(&config)?;

    let sink: Box<dyn BatchSink + Send> = match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output {}", path.display()))?;
            Box::new(JsonLinesSink::new(BufWriter::new(file)))
        }
        None => Box::new(JsonLinesSink::new(io::stdout())),
    };
    let dispatcher = tokio::spawn(dispatch_loop(batch_rx, sink));

    let (raw_tx, mut raw_rx) = mpsc::channel::<RawSample>(64);
    let provider = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening input {}", path.display()))?;
            tokio::spawn(location_loop(raw_tx, ReaderSource::new(BufReader::new(file)), period))
        }
        None => tokio::spawn(location_loop(
            raw_tx,
            ReaderSource::new(BufReader::new(io::stdin())),
            period,
        )),
    };

    while let Some(raw) = raw_rx.recv().await {
        let now_ms = if args.live {
            Utc::now().timestamp_millis()
        } else {
            raw.receipt_time_ms
        };
        pipeline.ingest(&raw, now_ms)?;
    }

    // Ship the tail; wait for the dispatcher if it is still catching up
    while let FlushOutcome::Deferred { .. } = pipeline.flush()? {
        sleep(Duration::from_millis(10)).await;
    }

    let stats = pipeline.stats().clone();
    let estimate = pipeline.estimate().ok();
    drop(pipeline);

    let forwarded = provider.await?;
    let report = dispatcher.await?;

    log::info!("=== Final Stats ===");
    log::info!("Fixes read: {}", forwarded);
    log::info!("Ingest: {}", serde_json::to_string(&stats)?);
    if let Some(fix) = estimate {
        log::info!(
            "Smoothed position: {:.6}, {:.6} (±{:.1} m)",
            fix.latitude,
            fix.longitude,
            fix.accuracy_m
        );
    }
    log::info!("Dispatch: {}", serde_json::to_string(&report)?);

    Ok(())
}

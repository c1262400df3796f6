//! Desktop simulator for the linestream ingestion pipeline.
//!
//! Runs the pipeline on the embassy std executor with synthetic traces. Every
//! stream publishes its deltas on a pub-sub channel; a headless display task
//! replays them into mirrors, standing in for a chart. The rate label is
//! logged on every rate tick.
//!
//! # Environment
//!
//! | Variable                       | Default                      |
//! |--------------------------------|------------------------------|
//! | `LINESTREAM_STREAMS`           | `Series A,…,Series E`        |
//! | `LINESTREAM_HALF_LENGTH`       | 1250                         |
//! | `LINESTREAM_POINTS_PER_FRAME`  | 5                            |
//! | `LINESTREAM_RETENTION`         | 1000                         |
//! | `LINESTREAM_FRAME_MS`          | 16                           |
//! | `LINESTREAM_SEED`              | fixed                        |
//! | `LINESTREAM_RUN_SECS`          | 10 (0 runs until killed)     |
//!
//! Logging is controlled with `RUST_LOG`, e.g. `RUST_LOG=debug`.

use std::env;
use std::str::FromStr;

use embassy_executor::Spawner;
use embassy_futures::select::select3;
use embassy_sync::pubsub::WaitResult;
use embassy_time::{Duration, Instant, Timer};
use log::{debug, error, info, warn};

use linestream_core::generator::DEFAULT_TRACE_SEED;
use linestream_core::{
    ChannelSink, MirrorSink, Pipeline, PipelineConfig, ProgressiveTraceGenerator, RenderSink,
    StreamConfig, StreamEvent, StreamEventChannel,
};

/// Deltas from every stream to the display task
static EVENTS: StreamEventChannel = StreamEventChannel::new();

/// Default simulated run length
const DEFAULT_RUN_SECS: u64 = 10;

/// How often the status line is logged
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn env_override<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *target = value,
            Err(_) => warn!("Ignoring {}={:?}: not a valid value", key, raw),
        }
    }
}

fn config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Ok(names) = env::var("LINESTREAM_STREAMS") {
        config.streams = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(StreamConfig::new)
            .collect();
    }
    env_override("LINESTREAM_HALF_LENGTH", &mut config.half_length);
    env_override("LINESTREAM_POINTS_PER_FRAME", &mut config.points_per_frame);
    env_override("LINESTREAM_RETENTION", &mut config.retention);
    env_override("LINESTREAM_FRAME_MS", &mut config.frame_interval_ms);

    config
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Replay stream events into one mirror per configured stream
async fn display(mut mirrors: Vec<MirrorSink>) {
    let mut subscriber = match EVENTS.subscriber() {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!("Display could not subscribe to stream events: {:?}", e);
            return;
        }
    };

    loop {
        match subscriber.next_message().await {
            WaitResult::Message(event) => {
                let Some(mirror) = mirrors.get_mut(event.stream()) else {
                    continue;
                };
                event.apply_to(mirror);
                if let StreamEvent::Replaced { stream, .. } = &event {
                    debug!(
                        "Stream {} redrawn with {} points",
                        stream,
                        mirror.displayed().len()
                    );
                }
            }
            WaitResult::Lagged(missed) => {
                warn!("Display lagged behind, {} events dropped", missed);
            }
        }
    }
}

/// Log cursor position and buffer sizes
async fn status<S: RenderSink>(pipeline: &Pipeline<S>) {
    loop {
        Timer::after(STATUS_INTERVAL).await;
        let lengths: Vec<usize> = pipeline.streams().iter().map(|s| s.len()).collect();
        info!("x={} buffered={:?}", pipeline.cursor(), lengths);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::init();
    info!("Starting linestream simulator");

    let config = config_from_env();
    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    let mut seed = DEFAULT_TRACE_SEED;
    env_override("LINESTREAM_SEED", &mut seed);
    let mut run_secs = DEFAULT_RUN_SECS;
    env_override("LINESTREAM_RUN_SECS", &mut run_secs);

    let mirrors = config.streams.iter().map(|_| MirrorSink::new()).collect();
    let mut generator = ProgressiveTraceGenerator::new(seed);

    let pipeline = match Pipeline::start(config, &mut generator, Instant::now(), |position, _| {
        ChannelSink::new(position, &EVENTS)
    })
    .await
    {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Pipeline failed to start: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Streaming {} series for {}",
        pipeline.streams().len(),
        if run_secs == 0 {
            "ever".to_string()
        } else {
            format!("{} s", run_secs)
        }
    );

    let stop = async {
        if run_secs == 0 {
            core::future::pending::<()>().await;
        } else {
            Timer::after_secs(run_secs).await;
        }
    };

    select3(
        async {
            embassy_futures::join::join(pipeline.run_paced(), status(&pipeline)).await;
        },
        display(mirrors),
        stop,
    )
    .await;

    if let Some(reading) = pipeline.latest_rate() {
        info!("Final rate: {} samples/s", reading.rounded());
    }
    info!("Simulator exiting at x={}", pipeline.cursor());

    // The std executor never returns on its own
    std::process::exit(0);
}

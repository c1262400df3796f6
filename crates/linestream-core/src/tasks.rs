//! Periodic tasks driving a [`Pipeline`]
//!
//! Three loops share one pipeline by reference:
//!
//! | Loop      | Cadence                    | Body                   |
//! |-----------|----------------------------|------------------------|
//! | ingestion | frame, re-requested per tick | [`Pipeline::tick`]   |
//! | trimmer   | fixed interval             | [`Pipeline::trim`]     |
//! | rate      | fixed interval             | [`Pipeline::update_rate`] |
//!
//! Each body is synchronous, so a loop can only be cancelled between ticks.
//! Tearing the pipeline down means dropping the future returned by
//! [`Pipeline::run`].
//!
//! ```rust,ignore
//! let pipeline = Pipeline::start(config, &mut generator, Instant::now(), make_sink).await?;
//! select(pipeline.run_paced(), shutdown.wait()).await;
//! ```

use embassy_futures::join::join3;
use embassy_time::{Duration, Instant, Ticker, Timer};
use log::info;

use crate::pipeline::Pipeline;
use crate::sink::RenderSink;

/// Longest rate label rendered by the rate loop
pub const RATE_LABEL_CAPACITY: usize = 96;

/// Source of "call me again" signals
pub trait Cadence {
    /// Resolve when the next tick is due
    fn next_tick(&mut self) -> impl Future<Output = ()>;
}

/// Frame cadence: waits one frame after every tick
///
/// The wait starts only once the previous tick has finished, so a slow tick
/// stretches the frame instead of queueing up extra ticks.
#[derive(Debug, Clone, Copy)]
pub struct FramePacer {
    frame: Duration,
}

impl FramePacer {
    pub const fn new(frame: Duration) -> Self {
        Self { frame }
    }
}

impl Cadence for FramePacer {
    async fn next_tick(&mut self) {
        Timer::after(self.frame).await;
    }
}

impl Cadence for Ticker {
    async fn next_tick(&mut self) {
        self.next().await;
    }
}

impl<S: RenderSink> Pipeline<S> {
    /// Ingest immediately, then once per `frames` tick
    pub async fn run_ingestion<C: Cadence>(&self, mut frames: C) {
        loop {
            self.tick();
            frames.next_tick().await;
        }
    }

    /// Trim on every `cadence` tick
    pub async fn run_trimmer<C: Cadence>(&self, mut cadence: C) {
        loop {
            cadence.next_tick().await;
            self.trim();
        }
    }

    /// Publish the rate on every `cadence` tick
    pub async fn run_rate<C: Cadence>(&self, mut cadence: C) {
        loop {
            cadence.next_tick().await;
            if self.update_rate(Instant::now()).is_some() {
                if let Some(label) = self.rate_label::<RATE_LABEL_CAPACITY>() {
                    info!("{}", label);
                }
            }
        }
    }

    /// Run all three loops until the returned future is dropped
    pub async fn run<F, T, R>(&self, frames: F, trim: T, rate: R)
    where
        F: Cadence,
        T: Cadence,
        R: Cadence,
    {
        join3(
            self.run_ingestion(frames),
            self.run_trimmer(trim),
            self.run_rate(rate),
        )
        .await;
    }

    /// [`run`](Self::run) with the cadences from the pipeline's config
    pub async fn run_paced(&self) {
        let config = self.config();
        self.run(
            FramePacer::new(config.frame_interval()),
            Ticker::every(config.trim_interval()),
            Ticker::every(config.rate_interval()),
        )
        .await;
    }
}

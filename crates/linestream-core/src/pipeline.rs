//! The assembled ingestion pipeline
//!
//! A [`Pipeline`] owns the streams, the ingestion scheduler (and with it the
//! shared cursor), the retention trimmer and the rate meter. It is built once
//! at startup and then shared by reference with the three periodic tasks;
//! see [`crate::tasks`] for the async loops.

extern crate alloc;
use alloc::vec::Vec;

use embassy_time::Instant;
use log::{info, warn};

use crate::config::{FailurePolicy, PipelineConfig, StreamConfig};
use crate::dataset::CyclicDatasetBuilder;
use crate::error::{PipelineError, PipelineResult};
use crate::generator::SampleGenerator;
use crate::metrics::{RateMeter, RateReading};
use crate::sample::Sample;
use crate::sampling::IngestionScheduler;
use crate::sink::RenderSink;
use crate::storage::{RetentionTrimmer, TrimReport};
use crate::stream::Stream;

/// Upper bound on samples pre-allocated per stream buffer at startup
///
/// Buffers still grow past this on demand; the cap only keeps a huge
/// retention window from reserving memory up front.
pub const MAX_PREALLOCATED_SAMPLES: usize = 16 * 1024;

/// Bounded multi-stream ingestion pipeline
pub struct Pipeline<S> {
    streams: Vec<Stream<S>>,
    scheduler: IngestionScheduler,
    trimmer: RetentionTrimmer,
    rate: RateMeter,
    config: PipelineConfig,
}

impl<S: RenderSink> Pipeline<S> {
    /// Validate `config`, generate every stream's dataset and assemble the
    /// pipeline. Nothing ticks until the caller starts the periodic tasks.
    ///
    /// `make_sink` is called with the position and config of each stream
    /// that made it through generation. `now` starts the first rate window.
    pub async fn start<G, F>(
        config: PipelineConfig,
        generator: &mut G,
        now: Instant,
        mut make_sink: F,
    ) -> PipelineResult<Self>
    where
        G: SampleGenerator,
        F: FnMut(usize, &StreamConfig) -> S,
    {
        config.validate()?;

        let scheduler = IngestionScheduler::new(config.points_per_frame)?;
        let trimmer = RetentionTrimmer::new(config.retention)?;
        // Headroom for one trim interval of ingestion at a typical frame rate
        let capacity = config
            .retention
            .saturating_add(config.points_per_frame.saturating_mul(64))
            .min(MAX_PREALLOCATED_SAMPLES);

        let mut streams = Vec::with_capacity(config.streams.len());
        let mut builder = CyclicDatasetBuilder::new(generator);

        for (position, stream_config) in config.streams.iter().enumerate() {
            let z = stream_config.z_level(position);
            let dataset = match builder.build(config.half_length, z).await {
                Ok(dataset) => dataset,
                Err(PipelineError::Generation { error, .. }) => match config.failure_policy {
                    FailurePolicy::AbortAll => {
                        return Err(PipelineError::Generation {
                            stream: position,
                            error,
                        });
                    }
                    FailurePolicy::ExcludeStream => {
                        warn!(
                            "Excluding stream {} ({}): {}",
                            position, stream_config.name, error
                        );
                        continue;
                    }
                },
                Err(other) => return Err(other),
            };

            let sink = make_sink(position, stream_config);
            streams.push(Stream::new(
                position,
                stream_config.name.clone(),
                dataset,
                sink,
                capacity,
            ));
        }

        if streams.is_empty() {
            return Err(PipelineError::NoStreams);
        }

        info!(
            "Pipeline ready: {} streams, {} points/frame, retention {}",
            streams.len(),
            config.points_per_frame,
            config.retention
        );

        Ok(Self {
            streams,
            scheduler,
            trimmer,
            rate: RateMeter::new(now, config.rate_reset()),
            config,
        })
    }

    /// Ingestion body: append one batch to every stream
    pub fn tick(&self) -> u64 {
        self.scheduler.tick(&self.streams, &self.rate)
    }

    /// Trimmer body: enforce the retention window on every stream
    ///
    /// Runs in lock-step with ingestion, so no tick lands between two
    /// streams being trimmed.
    pub fn trim(&self) -> TrimReport {
        self.scheduler.lock_step(|| self.trimmer.trim(&self.streams))
    }

    /// Rate body: publish the current rate, resetting the window when due
    pub fn update_rate(&self, now: Instant) -> Option<RateReading> {
        self.rate.on_tick(now)
    }

    /// Last published rate
    pub fn latest_rate(&self) -> Option<RateReading> {
        self.rate.latest()
    }

    /// Render the configured rate label for the last published rate
    pub fn rate_label<const N: usize>(&self) -> Option<heapless::String<N>> {
        let reading = self.latest_rate()?;
        reading.label(&self.config.rate_label).ok()
    }

    /// Active streams in config order
    pub fn streams(&self) -> &[Stream<S>] {
        &self.streams
    }

    /// Stream configured at `position`, the same id its sink was built with
    ///
    /// `None` if no stream was configured there or it was excluded at
    /// startup.
    pub fn stream(&self, position: usize) -> Option<&Stream<S>> {
        self.streams
            .binary_search_by_key(&position, Stream::position)
            .ok()
            .map(|i| &self.streams[i])
    }

    /// Copy of one stream's buffered samples
    pub fn snapshot(&self, position: usize) -> Option<Vec<Sample>> {
        self.stream(position).map(Stream::snapshot)
    }

    /// Copy of every active stream's samples, taken between ticks and trims
    pub fn snapshot_all(&self) -> Vec<Vec<Sample>> {
        self.scheduler.lock_step(|| self.streams.iter().map(Stream::snapshot).collect())
    }

    /// Primary-axis position of the next tick
    pub fn cursor(&self) -> u64 {
        self.scheduler.cursor()
    }

    pub fn rate_meter(&self) -> &RateMeter {
        &self.rate
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::generator::ProgressiveTraceGenerator;
    use crate::sample::TracePoint;
    use crate::sink::{ChannelSink, MirrorSink, NullSink, StreamEventChannel};
    use core::sync::atomic::{AtomicBool, Ordering};
    use embassy_futures::block_on;
    use embassy_sync::pubsub::WaitResult;

    extern crate std;

    /// Fails every `nth` call, counting from zero
    struct FlakyGenerator {
        inner: ProgressiveTraceGenerator,
        calls: usize,
        fail_on: usize,
    }

    impl SampleGenerator for FlakyGenerator {
        async fn generate(&mut self, count: usize) -> Result<Vec<TracePoint>, GenerationError> {
            let call = self.calls;
            self.calls += 1;
            if call == self.fail_on {
                return Err(GenerationError::Unavailable("flaky"));
            }
            self.inner.generate(count).await
        }
    }

    fn flaky(fail_on: usize) -> FlakyGenerator {
        FlakyGenerator {
            inner: ProgressiveTraceGenerator::default(),
            calls: 0,
            fail_on,
        }
    }

    fn start_with<G: SampleGenerator>(
        config: PipelineConfig,
        generator: &mut G,
    ) -> PipelineResult<Pipeline<MirrorSink>> {
        block_on(Pipeline::start(
            config,
            generator,
            Instant::from_millis(0),
            |_, _| MirrorSink::new(),
        ))
    }

    #[test]
    fn test_demo_scenario_converges_to_retention() {
        let config = PipelineConfig::default();
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = start_with(config, &mut generator).unwrap();

        assert_eq!(pipeline.streams().len(), 5);
        for stream in pipeline.streams() {
            assert_eq!(stream.dataset().len(), 2498);
        }

        // Trimmer fires on its own cadence, here every 250 frames
        for frame in 1..=1000 {
            pipeline.tick();
            if frame % 250 == 0 {
                pipeline.trim();
            }
        }

        assert_eq!(pipeline.cursor(), 5000);
        for stream in pipeline.streams() {
            let samples = stream.snapshot();
            assert_eq!(samples.len(), 1000);
            for (offset, sample) in samples.iter().enumerate() {
                assert_eq!(sample.index, 4000 + offset as u64);
            }
            assert_eq!(samples[999].index, pipeline.cursor() - 1);
            stream.inspect_sink(|sink| assert_eq!(sink.displayed(), samples.as_slice()));
        }
    }

    #[test]
    fn test_z_levels_follow_config() {
        let mut config = PipelineConfig::default();
        config.streams[2] = StreamConfig::new("raised").with_z(10.0);
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = start_with(config, &mut generator).unwrap();

        pipeline.tick();
        let zs: Vec<f32> = pipeline
            .streams()
            .iter()
            .map(|s| s.snapshot()[0].value.z)
            .collect();
        assert_eq!(zs, [0.0, 1.0, 10.0, 3.0, 4.0]);
        assert_eq!(pipeline.stream(2).map(|s| s.name()), Some("raised"));
    }

    #[test]
    fn test_invalid_config_fails_before_generation() {
        let mut config = PipelineConfig::default();
        config.points_per_frame = 0;
        let mut generator = flaky(usize::MAX);

        assert!(matches!(
            start_with(config, &mut generator),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
        assert_eq!(generator.calls, 0);
    }

    #[test]
    fn test_generation_failure_aborts_by_default() {
        let mut generator = flaky(2);
        let result = start_with(PipelineConfig::default(), &mut generator);

        assert!(matches!(
            result,
            Err(PipelineError::Generation {
                stream: 2,
                error: GenerationError::Unavailable(_)
            })
        ));
        assert_eq!(generator.calls, 3);
    }

    #[test]
    fn test_generation_failure_can_exclude_stream() {
        let mut config = PipelineConfig::default();
        config.failure_policy = FailurePolicy::ExcludeStream;
        let mut generator = flaky(1);
        let pipeline = start_with(config, &mut generator).unwrap();

        let names: Vec<&str> = pipeline.streams().iter().map(|s| s.name()).collect();
        assert_eq!(names, ["Series A", "Series C", "Series D", "Series E"]);

        // Streams keep their configured position and z level
        pipeline.tick();
        assert!(pipeline.stream(1).is_none());
        assert!(pipeline.snapshot(1).is_none());
        assert_eq!(pipeline.stream(2).map(|s| s.name()), Some("Series C"));
        assert_eq!(pipeline.snapshot(2).unwrap()[0].value.z, 2.0);
        assert!(pipeline.stream(5).is_none());
    }

    #[test]
    fn test_sink_ids_resolve_after_exclusion() {
        let channel = StreamEventChannel::new();
        let mut subscriber = channel.subscriber().unwrap();
        let mut config = PipelineConfig::default();
        config.failure_policy = FailurePolicy::ExcludeStream;
        let names: Vec<_> = config.streams.iter().map(|s| s.name.clone()).collect();
        let mut generator = flaky(1);

        let pipeline = block_on(Pipeline::start(
            config,
            &mut generator,
            Instant::from_millis(0),
            |position, _| ChannelSink::new(position, &channel),
        ))
        .unwrap();
        pipeline.tick();

        let mut ids = Vec::new();
        while let Some(WaitResult::Message(event)) = subscriber.try_next_message() {
            let id = event.stream();
            let stream = pipeline.stream(id).unwrap();
            assert_eq!(stream.position(), id);
            assert_eq!(stream.name(), names[id]);
            assert_eq!(pipeline.snapshot(id).unwrap().len(), 5);
            ids.push(id);
        }
        assert_eq!(ids, [0, 2, 3, 4]);
    }

    #[test]
    fn test_huge_retention_starts_without_preallocating() {
        let mut config = PipelineConfig::default();
        config.retention = usize::MAX;
        assert!(config.validate().is_ok());
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = start_with(config, &mut generator).unwrap();

        pipeline.tick();
        assert_eq!(pipeline.trim(), TrimReport::default());
        for stream in pipeline.streams() {
            assert_eq!(stream.len(), 5);
        }
    }

    #[test]
    fn test_huge_batch_size_starts() {
        let mut config = PipelineConfig::default();
        config.points_per_frame = usize::MAX / 2;
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = start_with(config, &mut generator).unwrap();

        assert_eq!(pipeline.cursor(), 0);
        assert_eq!(pipeline.streams().len(), 5);
    }

    #[test]
    fn test_streams_stay_in_lock_step_across_threads() {
        const TICKS: u64 = 400;
        let config = PipelineConfig {
            half_length: 16,
            points_per_frame: 3,
            retention: 20,
            ..PipelineConfig::default()
        };
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = start_with(config, &mut generator).unwrap();
        let ingesting = AtomicBool::new(true);

        let check = |snapshots: &[Vec<Sample>]| {
            let reference: Vec<u64> = snapshots[0].iter().map(|s| s.index).collect();
            for snapshot in &snapshots[1..] {
                let indices: Vec<u64> = snapshot.iter().map(|s| s.index).collect();
                assert_eq!(indices, reference);
            }
            for pair in reference.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
        };

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..TICKS {
                    pipeline.tick();
                    std::thread::yield_now();
                }
                ingesting.store(false, Ordering::Release);
            });
            scope.spawn(|| {
                while ingesting.load(Ordering::Acquire) {
                    pipeline.trim();
                    std::thread::yield_now();
                }
            });
            scope.spawn(|| {
                while ingesting.load(Ordering::Acquire) {
                    check(&pipeline.snapshot_all());
                    std::thread::yield_now();
                }
            });
        });

        check(&pipeline.snapshot_all());
        let streams = pipeline.streams().len() as u64;
        assert_eq!(pipeline.cursor(), TICKS * 3);
        assert_eq!(
            pipeline.rate_meter().accumulator().sample_count,
            TICKS * 3 * streams
        );
        for stream in pipeline.streams() {
            let samples = stream.snapshot();
            assert_eq!(samples.last().map(|s| s.index), Some(TICKS * 3 - 1));
            stream.inspect_sink(|sink| assert_eq!(sink.displayed(), samples.as_slice()));
        }
    }

    #[test]
    fn test_all_streams_excluded() {
        let mut config = PipelineConfig::default();
        config.streams.truncate(1);
        config.failure_policy = FailurePolicy::ExcludeStream;
        let mut generator = flaky(0);

        assert!(matches!(
            start_with(config, &mut generator),
            Err(PipelineError::NoStreams)
        ));
    }

    #[test]
    fn test_rate_label_after_reading() {
        let mut generator = ProgressiveTraceGenerator::default();
        let pipeline = block_on(Pipeline::start(
            PipelineConfig::default(),
            &mut generator,
            Instant::from_millis(0),
            |_, _| NullSink,
        ))
        .unwrap();

        assert!(pipeline.rate_label::<64>().is_none());
        for _ in 0..200 {
            pipeline.tick();
        }

        let reading = pipeline.update_rate(Instant::from_millis(1000)).unwrap();
        assert_eq!(reading.rounded(), 5000);
        let label = pipeline.rate_label::<64>().unwrap();
        assert_eq!(label.as_str(), "3D Realtime Line Series (5000 data points / s)");
    }
}

//! Bounded real-time multi-series ingestion
//!
//! Streams are fed from cyclic datasets at a frame cadence, trimmed to a
//! fixed retention window on a slower cadence, and measured by a rate meter.
//! Every append and trim is forwarded to a per-stream rendering sink so the
//! displayed content never diverges from the buffered content.
//!
//! The crate is `#![no_std]` with `extern crate alloc` so it runs on embedded
//! executors as well as on desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod config;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod metrics;
pub mod pipeline;
pub mod sample;
pub mod sampling;
pub mod sink;
pub mod storage;
pub mod stream;
pub mod tasks;

pub use config::{FailurePolicy, PipelineConfig, StreamConfig};
pub use dataset::{CyclicDataset, CyclicDatasetBuilder};
pub use error::{GenerationError, PipelineError, PipelineResult};
pub use generator::{ProgressiveTraceGenerator, SampleGenerator};
pub use metrics::{RateAccumulator, RateMeter, RateReading};
pub use pipeline::Pipeline;
pub use sample::{Sample, SampleValue, TracePoint};
pub use sampling::IngestionScheduler;
pub use sink::{ChannelSink, MirrorSink, NullSink, RenderSink, StreamEvent, StreamEventChannel};
pub use storage::{RetentionTrimmer, StreamBuffer, TrimReport};
pub use stream::Stream;
pub use tasks::{Cadence, FramePacer};

//! Error types for pipeline construction
//!
//! Every error here is raised while the pipeline is being built. Steady-state
//! operations (tick, trim, rate read/reset) are total and never fail.

use thiserror_no_std::Error;

/// Failure reported by a [`SampleGenerator`](crate::generator::SampleGenerator)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The generator produced fewer points than were requested
    #[error("Generator produced {produced} points, expected {expected}")]
    ShortTrace {
        /// Number of points requested
        expected: usize,
        /// Number of points actually produced
        produced: usize,
    },

    /// The generator could not produce a trace at all
    #[error("Generator unavailable: {0}")]
    Unavailable(&'static str),
}

/// Error types for building and configuring a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A configuration value is out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Which constraint was violated
        reason: &'static str,
    },

    /// Dataset generation failed for a stream during startup
    #[error("Dataset generation failed for stream {stream}: {error}")]
    Generation {
        /// Position of the stream in the configuration
        stream: usize,
        /// Underlying generator failure
        error: GenerationError,
    },

    /// Every configured stream was excluded after generation failures
    #[error("No streams left to ingest into")]
    NoStreams,

    /// Configuration bytes could not be encoded or decoded
    #[error("Config codec error: {0}")]
    ConfigCodec(postcard::Error),
}

impl PipelineError {
    pub(crate) const fn invalid(reason: &'static str) -> Self {
        Self::InvalidConfiguration { reason }
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

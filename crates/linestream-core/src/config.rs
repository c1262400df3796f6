//! Pipeline configuration
//!
//! The stream list and every cadence are fixed for the lifetime of a
//! pipeline. Configs can be stored as postcard bytes, e.g. in flash or a
//! settings file, and must pass [`PipelineConfig::validate`] before use.

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::dataset::MIN_HALF_LENGTH;
use crate::error::{PipelineError, PipelineResult};

/// Default stream names
pub const DEFAULT_STREAM_NAMES: [&str; 5] =
    ["Series A", "Series B", "Series C", "Series D", "Series E"];

/// Unique points per stream before the dataset loops
pub const DEFAULT_UNIQUE_POINTS: usize = 2500;

/// Default rate label; `{rate}` is replaced by the rounded rate
pub const DEFAULT_RATE_LABEL: &str = "3D Realtime Line Series ({rate} data points / s)";

/// What to do when a stream's dataset cannot be generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Any failure aborts startup
    #[default]
    AbortAll,
    /// Failed streams are logged and left out
    ExcludeStream,
}

/// Configuration of a single stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    /// Depth level; defaults to the stream's position in the config
    pub z: Option<f32>,
}

impl StreamConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            z: None,
        }
    }

    pub fn with_z(mut self, z: f32) -> Self {
        self.z = Some(z);
        self
    }

    /// Depth level for a stream configured at `position`
    pub fn z_level(&self, position: usize) -> f32 {
        self.z.unwrap_or(position as f32)
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub streams: Vec<StreamConfig>,
    /// Base trace length U; each dataset holds `2U - 2` values
    pub half_length: usize,
    /// Samples appended to each stream per tick
    pub points_per_frame: usize,
    /// Samples kept per stream after a trim
    pub retention: usize,
    pub trim_interval_ms: u64,
    pub rate_interval_ms: u64,
    pub rate_reset_ms: u64,
    /// Delay requested after each ingestion tick
    pub frame_interval_ms: u64,
    pub failure_policy: FailurePolicy,
    pub rate_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            streams: DEFAULT_STREAM_NAMES
                .iter()
                .map(|name| StreamConfig::new(*name))
                .collect(),
            half_length: DEFAULT_UNIQUE_POINTS / 2,
            points_per_frame: 5,
            retention: 1000,
            trim_interval_ms: 1000,
            rate_interval_ms: 1000,
            rate_reset_ms: 5000,
            frame_interval_ms: 16,
            failure_policy: FailurePolicy::AbortAll,
            rate_label: String::from(DEFAULT_RATE_LABEL),
        }
    }
}

impl PipelineConfig {
    /// Check every value that would otherwise fail at construction time
    pub fn validate(&self) -> PipelineResult<()> {
        if self.streams.is_empty() {
            return Err(PipelineError::invalid("at least one stream is required"));
        }
        if self.half_length < MIN_HALF_LENGTH {
            return Err(PipelineError::invalid("half length must be at least 2"));
        }
        if self.points_per_frame == 0 {
            return Err(PipelineError::invalid("points per frame must be positive"));
        }
        if self.retention == 0 {
            return Err(PipelineError::invalid("retention window must be positive"));
        }
        if self.trim_interval_ms == 0 || self.rate_interval_ms == 0 || self.rate_reset_ms == 0 {
            return Err(PipelineError::invalid("periodic intervals must be positive"));
        }
        Ok(())
    }

    pub fn trim_interval(&self) -> Duration {
        Duration::from_millis(self.trim_interval_ms)
    }

    pub fn rate_interval(&self) -> Duration {
        Duration::from_millis(self.rate_interval_ms)
    }

    pub fn rate_reset(&self) -> Duration {
        Duration::from_millis(self.rate_reset_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Number of values in each stream's cyclic dataset, 0 if the half
    /// length is too short to mirror
    pub fn dataset_len(&self) -> usize {
        if self.half_length < MIN_HALF_LENGTH {
            return 0;
        }
        self.half_length.saturating_mul(2) - 2
    }

    /// Encode as postcard bytes
    pub fn to_bytes(&self) -> PipelineResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(PipelineError::ConfigCodec)
    }

    /// Decode from postcard bytes and validate
    pub fn from_bytes(bytes: &[u8]) -> PipelineResult<Self> {
        let config: Self = postcard::from_bytes(bytes).map_err(PipelineError::ConfigCodec)?;
        config.validate()?;
        Ok(config)
    }
}

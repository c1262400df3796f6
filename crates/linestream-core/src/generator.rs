//! Trace generators used to seed cyclic datasets
//!
//! The pipeline only talks to generators through [`SampleGenerator`]. The
//! crate ships [`ProgressiveTraceGenerator`], a seeded random walk that
//! advances x by one per point, which is what the simulator uses.

extern crate alloc;
use alloc::vec::Vec;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::GenerationError;
use crate::sample::TracePoint;

/// Trait for producers of base waveforms.
///
/// Called once per stream at startup, never on the hot path, so
/// implementations are free to be slow or to await I/O.
pub trait SampleGenerator {
    /// Produce `count` ordered points.
    fn generate(
        &mut self,
        count: usize,
    ) -> impl Future<Output = Result<Vec<TracePoint>, GenerationError>>;
}

/// Default seed so repeated runs produce the same traces
pub const DEFAULT_TRACE_SEED: u64 = 0x6c69_6e65;

/// Default maximum change in y between two consecutive points
pub const DEFAULT_TRACE_STEP: f32 = 2.0;

/// Random-walk trace generator
///
/// Each call continues the same random sequence, so consecutive streams get
/// different traces from one generator.
pub struct ProgressiveTraceGenerator {
    rng: SmallRng,
    step: f32,
}

impl ProgressiveTraceGenerator {
    /// Create a generator with an explicit seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            step: DEFAULT_TRACE_STEP,
        }
    }

    /// Set the maximum change in y between consecutive points
    pub fn with_step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    /// Maximum change in y between consecutive points
    pub fn step(&self) -> f32 {
        self.step
    }

    fn walk(&mut self, count: usize) -> Vec<TracePoint> {
        let mut points = Vec::with_capacity(count);
        let mut y = 0.0_f32;
        for i in 0..count {
            points.push(TracePoint::new(i as f32, y));
            let r: f32 = self.rng.r#gen();
            y += (r - 0.5) * self.step;
        }
        points
    }
}

impl Default for ProgressiveTraceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_SEED)
    }
}

impl SampleGenerator for ProgressiveTraceGenerator {
    async fn generate(&mut self, count: usize) -> Result<Vec<TracePoint>, GenerationError> {
        Ok(self.walk(count))
    }
}

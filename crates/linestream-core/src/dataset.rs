//! Cyclic datasets: finite traces that loop without a visible seam
//!
//! A base trace of `U` points is mirrored onto itself, dropping the two
//! duplicated endpoints, which yields `2U - 2` values. Indexing the result
//! modulo its length walks forward through the base, back down the mirror,
//! and lands next to where it started, so the wrap point is as smooth as any
//! interior step.

extern crate alloc;
use alloc::vec::Vec;

use log::info;

use crate::error::{GenerationError, PipelineError, PipelineResult};
use crate::generator::SampleGenerator;
use crate::sample::SampleValue;

/// Smallest base length that can be mirrored
pub const MIN_HALF_LENGTH: usize = 2;

/// Fixed-length, wrap-continuous sequence of sample values
#[derive(Debug, Clone, PartialEq)]
pub struct CyclicDataset {
    values: Vec<SampleValue>,
}

impl CyclicDataset {
    /// Mirror an existing base trace into a cyclic dataset
    ///
    /// Returns `base ++ reverse(base[1..len - 1])`.
    pub fn from_values(mut base: Vec<SampleValue>) -> PipelineResult<Self> {
        if base.len() < MIN_HALF_LENGTH {
            return Err(PipelineError::invalid("half length must be at least 2"));
        }

        let last = base.len() - 1;
        base.reserve(last - 1);
        for i in (1..last).rev() {
            let value = base[i];
            base.push(value);
        }

        Ok(Self { values: base })
    }

    /// Value at an unbounded cursor position
    #[inline]
    pub fn at(&self, cursor: u64) -> SampleValue {
        // Length is at least 2, so the modulo is always defined
        let len = self.values.len() as u64;
        self.values[(cursor % len) as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[SampleValue] {
        &self.values
    }
}

/// Builds one cyclic dataset per stream from a generator
pub struct CyclicDatasetBuilder<'g, G: SampleGenerator> {
    generator: &'g mut G,
}

impl<'g, G: SampleGenerator> CyclicDatasetBuilder<'g, G> {
    pub fn new(generator: &'g mut G) -> Self {
        Self { generator }
    }

    /// Generate a base trace of `half_length` points tagged with `z_level`
    /// and mirror it.
    ///
    /// Generator failures surface as [`PipelineError::Generation`] with
    /// `stream` set to 0; [`Pipeline::start`](crate::pipeline::Pipeline::start)
    /// rewrites it with the real stream position.
    pub async fn build(
        &mut self,
        half_length: usize,
        z_level: f32,
    ) -> PipelineResult<CyclicDataset> {
        if half_length < MIN_HALF_LENGTH {
            return Err(PipelineError::invalid("half length must be at least 2"));
        }

        let trace = self
            .generator
            .generate(half_length)
            .await
            .map_err(|error| PipelineError::Generation { stream: 0, error })?;

        if trace.len() < half_length {
            return Err(PipelineError::Generation {
                stream: 0,
                error: GenerationError::ShortTrace {
                    expected: half_length,
                    produced: trace.len(),
                },
            });
        }

        let base = trace
            .iter()
            .take(half_length)
            .map(|point| SampleValue::new(point.y, z_level))
            .collect();

        let dataset = CyclicDataset::from_values(base)?;
        info!(
            "Built cyclic dataset: {} values at z={}",
            dataset.len(),
            z_level
        );
        Ok(dataset)
    }
}

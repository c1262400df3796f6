//! Sample types shared by every stage of the pipeline

use serde::{Deserialize, Serialize};

/// Secondary coordinates of a sample
///
/// `y` is the traced value; `z` is a fixed per-stream level that keeps
/// streams apart on the depth axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleValue {
    pub y: f32,
    pub z: f32,
}

impl SampleValue {
    pub const fn new(y: f32, z: f32) -> Self {
        Self { y, z }
    }
}

/// A single ingested sample
///
/// `index` is the primary-axis position (the shared cursor at the moment the
/// sample was appended). Samples are immutable once created.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic position along the primary axis
    pub index: u64,
    /// Secondary coordinates
    pub value: SampleValue,
}

impl Sample {
    pub const fn new(index: u64, value: SampleValue) -> Self {
        Self { index, value }
    }
}

/// A point produced by a trace generator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub x: f32,
    pub y: f32,
}

impl TracePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

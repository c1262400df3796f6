//! Per-stream live storage
//!
//! [`StreamBuffer`] holds the samples currently "on screen" for one stream.
//! Only the ingestion scheduler appends to it and only the retention trimmer
//! removes from it; both forward the resulting delta to the stream's sink
//! themselves, so the buffer never knows a sink exists.

pub mod retention;

extern crate alloc;
use alloc::collections::VecDeque;

use crate::sample::Sample;

pub use retention::{RetentionTrimmer, TrimReport};

/// Ordered buffer of ingested samples
///
/// Insertion order is arrival order is primary-axis order. Between trims the
/// buffer may exceed the retention window by whatever was ingested since the
/// last trim.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    samples: VecDeque<Sample>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer that will not reallocate until `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a batch of samples to the back
    pub fn append(&mut self, batch: &[Sample]) {
        self.samples.extend(batch.iter().copied());
    }

    /// Keep only the most recent `keep` samples
    ///
    /// Returns the number of samples discarded from the front. Does nothing
    /// when the buffer already holds `keep` or fewer samples.
    pub fn trim_to_last(&mut self, keep: usize) -> usize {
        let excess = self.samples.len().saturating_sub(keep);
        if excess > 0 {
            self.samples.drain(..excess);
        }
        excess
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Oldest retained sample
    pub fn front(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Most recent sample
    pub fn back(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Iterate oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Borrow the retained samples as one slice, oldest first
    ///
    /// Rotates the ring internally if it has wrapped.
    pub fn as_slice(&mut self) -> &[Sample] {
        self.samples.make_contiguous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleValue;

    fn batch(start: u64, count: u64) -> alloc::vec::Vec<Sample> {
        (start..start + count)
            .map(|i| Sample::new(i, SampleValue::new(i as f32, 0.0)))
            .collect()
    }

    #[test]
    fn test_append_preserves_order() {
        let mut buffer = StreamBuffer::new();
        buffer.append(&batch(0, 3));
        buffer.append(&batch(3, 2));

        let indices: alloc::vec::Vec<u64> = buffer.iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut buffer = StreamBuffer::new();
        buffer.append(&batch(0, 10));

        assert_eq!(buffer.trim_to_last(4), 6);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.front().map(|s| s.index), Some(6));
        assert_eq!(buffer.back().map(|s| s.index), Some(9));
    }

    #[test]
    fn test_trim_below_window_is_noop() {
        let mut buffer = StreamBuffer::new();
        buffer.append(&batch(0, 3));

        assert_eq!(buffer.trim_to_last(5), 0);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_as_slice_after_wrap() {
        let mut buffer = StreamBuffer::with_capacity(4);
        buffer.append(&batch(0, 4));
        buffer.trim_to_last(2);
        buffer.append(&batch(4, 2));

        let indices: alloc::vec::Vec<u64> = buffer.as_slice().iter().map(|s| s.index).collect();
        assert_eq!(indices, [2, 3, 4, 5]);
    }
}

//! A logical data series: its dataset, live buffer and sink

extern crate alloc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::dataset::CyclicDataset;
use crate::sample::Sample;
use crate::sink::RenderSink;
use crate::storage::StreamBuffer;

/// Buffer and sink of a stream, always mutated together
struct StreamState<S> {
    buffer: StreamBuffer,
    sink: S,
}

/// One logical series of real-time samples
///
/// The dataset is immutable after construction. Buffer and sink sit behind
/// one mutex so append, trim and reads from other tasks are serialized per
/// stream.
///
/// `position` is the stream's index in the pipeline config. It stays stable
/// when other streams are excluded at startup and is the id sinks publish.
pub struct Stream<S> {
    position: usize,
    name: String,
    dataset: CyclicDataset,
    state: Mutex<CriticalSectionRawMutex, RefCell<StreamState<S>>>,
}

impl<S: RenderSink> Stream<S> {
    pub fn new(
        position: usize,
        name: String,
        dataset: CyclicDataset,
        sink: S,
        capacity: usize,
    ) -> Self {
        Self {
            position,
            name,
            dataset,
            state: Mutex::new(RefCell::new(StreamState {
                buffer: StreamBuffer::with_capacity(capacity),
                sink,
            })),
        }
    }

    /// Index of this stream in the pipeline config
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dataset(&self) -> &CyclicDataset {
        &self.dataset
    }

    /// Run `f` with exclusive access to the buffer and sink
    pub(crate) fn with_state<U>(&self, f: impl FnOnce(&mut StreamBuffer, &mut S) -> U) -> U {
        self.state.lock(|cell| {
            let mut state = cell.borrow_mut();
            let StreamState { buffer, sink } = &mut *state;
            f(buffer, sink)
        })
    }

    /// Number of samples currently buffered
    pub fn len(&self) -> usize {
        self.with_state(|buffer, _| buffer.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the buffered samples, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.with_state(|buffer, _| buffer.iter().copied().collect())
    }

    /// Inspect the sink, e.g. to read back a [`MirrorSink`](crate::sink::MirrorSink)
    pub fn inspect_sink<U>(&self, f: impl FnOnce(&S) -> U) -> U {
        self.with_state(|_, sink| f(sink))
    }
}

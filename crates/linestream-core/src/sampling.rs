//! Frame-paced ingestion
//!
//! The scheduler owns the shared primary-axis cursor. Every tick it pulls the
//! next `points_per_frame` values from each stream's cyclic dataset, tags
//! them with the cursor, appends them to the stream's buffer and forwards
//! them to the stream's sink. All streams advance in lock-step.

extern crate alloc;
use alloc::vec::Vec;
use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::trace;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics::RateMeter;
use crate::sample::Sample;
use crate::sink::RenderSink;
use crate::stream::Stream;

/// Drives the shared cursor and appends batches to every stream
pub struct IngestionScheduler {
    points_per_frame: usize,
    cursor: Mutex<CriticalSectionRawMutex, Cell<u64>>,
}

impl IngestionScheduler {
    /// Create a scheduler appending `points_per_frame` samples per stream per
    /// tick, starting at cursor 0
    pub fn new(points_per_frame: usize) -> PipelineResult<Self> {
        if points_per_frame == 0 {
            return Err(PipelineError::invalid("points per frame must be positive"));
        }

        Ok(Self {
            points_per_frame,
            cursor: Mutex::new(Cell::new(0)),
        })
    }

    pub fn points_per_frame(&self) -> usize {
        self.points_per_frame
    }

    /// Primary-axis position the next sample will carry
    pub fn cursor(&self) -> u64 {
        self.cursor.lock(|cursor| cursor.get())
    }

    /// Run `f` while holding the cursor, so no tick can interleave with it
    ///
    /// Used for operations that must see or leave every stream at the same
    /// length, such as trimming all streams or snapshotting them together.
    pub fn lock_step<U>(&self, f: impl FnOnce() -> U) -> U {
        self.cursor.lock(|_| f())
    }

    /// Append one batch to every stream
    ///
    /// Streams are visited in slice order. The cursor lock is held for the
    /// whole tick, so concurrent ticks cannot interleave and every stream
    /// receives the same run of primary coordinates. Returns the number of
    /// samples appended across all streams.
    pub fn tick<S: RenderSink>(&self, streams: &[Stream<S>], rate: &RateMeter) -> u64 {
        let k = self.points_per_frame;

        let appended = self.cursor.lock(|cursor| {
            let start = cursor.get();
            let mut batch = Vec::with_capacity(k);

            for stream in streams {
                batch.clear();
                let dataset = stream.dataset();
                for offset in 0..k as u64 {
                    let x = start.wrapping_add(offset);
                    batch.push(Sample::new(x, dataset.at(x)));
                }

                stream.with_state(|buffer, sink| {
                    buffer.append(&batch);
                    sink.append(&batch);
                });
            }

            let next = start.wrapping_add(k as u64);
            cursor.set(next);
            trace!("Ingested x={}..{} into {} streams", start, next, streams.len());
            (k as u64).saturating_mul(streams.len() as u64)
        });

        rate.record(appended);
        appended
    }
}

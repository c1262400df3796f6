//! Retention window enforcement

use log::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::sink::RenderSink;
use crate::stream::Stream;

/// Outcome of one trim pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    /// Streams whose buffer was at or over the window
    pub streams_trimmed: usize,
    /// Samples dropped across all streams
    pub samples_discarded: usize,
}

/// Periodically cuts every stream back to its most recent samples
pub struct RetentionTrimmer {
    retention: usize,
}

impl RetentionTrimmer {
    pub fn new(retention: usize) -> PipelineResult<Self> {
        if retention == 0 {
            return Err(PipelineError::invalid("retention window must be positive"));
        }
        Ok(Self { retention })
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Trim every stream holding at least `retention` samples
    ///
    /// The oldest excess samples are discarded and the stream's sink is
    /// repopulated with exactly the retained suffix. Streams below the window
    /// are left alone.
    pub fn trim<S: RenderSink>(&self, streams: &[Stream<S>]) -> TrimReport {
        let mut report = TrimReport::default();

        for stream in streams {
            stream.with_state(|buffer, sink| {
                if buffer.len() < self.retention {
                    return;
                }

                let discarded = buffer.trim_to_last(self.retention);
                sink.replace_all(buffer.as_slice());

                report.streams_trimmed += 1;
                report.samples_discarded += discarded;
                if discarded > 0 {
                    debug!("Trimmed {} samples from stream {}", discarded, stream.position());
                }
            });
        }

        report
    }
}

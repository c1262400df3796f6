//! Rendering sinks: where appended and retained samples are forwarded
//!
//! Every stream owns one [`RenderSink`]. The scheduler calls
//! [`RenderSink::append`] with each tick's new samples and the trimmer calls
//! [`RenderSink::replace_all`] with the retained suffix, both while holding
//! the stream's lock, so a sink always mirrors its buffer.
//!
//! [`ChannelSink`] turns those calls into [`StreamEvent`] messages on an
//! embassy-sync pub-sub channel so a display task can consume them without
//! touching pipeline state.

extern crate alloc;
use alloc::vec::Vec;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pubsub::{ImmediatePublisher, PubSubChannel};

use crate::sample::Sample;

/// Rendering boundary for one stream
///
/// Both calls are fire-and-forget and must not block.
pub trait RenderSink {
    /// Samples were appended to the stream, in order
    fn append(&mut self, samples: &[Sample]);

    /// The displayed content must become exactly `samples`
    fn replace_all(&mut self, samples: &[Sample]);
}

/// Sink that drops everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn append(&mut self, _samples: &[Sample]) {}

    fn replace_all(&mut self, _samples: &[Sample]) {}
}

/// Sink that keeps a copy of what would be displayed
#[derive(Debug, Default, Clone)]
pub struct MirrorSink {
    displayed: Vec<Sample>,
    appends: usize,
    replacements: usize,
}

impl MirrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn displayed(&self) -> &[Sample] {
        &self.displayed
    }

    /// Number of `append` calls received
    pub fn appends(&self) -> usize {
        self.appends
    }

    /// Number of `replace_all` calls received
    pub fn replacements(&self) -> usize {
        self.replacements
    }
}

impl RenderSink for MirrorSink {
    fn append(&mut self, samples: &[Sample]) {
        self.displayed.extend_from_slice(samples);
        self.appends += 1;
    }

    fn replace_all(&mut self, samples: &[Sample]) {
        self.displayed.clear();
        self.displayed.extend_from_slice(samples);
        self.replacements += 1;
    }
}

/// Channel capacity for stream events
/// Sized for a few frames of 5 streams without the display task running
pub const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Number of subscribers that can listen to stream events
/// - Subscriber 0: display task
/// - Subscriber 1: spare, e.g. a recorder or a test probe
pub const EVENT_SUBSCRIBERS: usize = 2;

/// Publisher slots; sinks use immediate publishers, which take none
pub const EVENT_PUBLISHERS: usize = 1;

/// Channel type carrying stream events
pub type StreamEventChannel = PubSubChannel<
    CriticalSectionRawMutex,
    StreamEvent,
    EVENT_CHANNEL_CAPACITY,
    EVENT_SUBSCRIBERS,
    EVENT_PUBLISHERS,
>;

/// Delta published by a [`ChannelSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// New samples were appended to a stream
    Appended { stream: usize, samples: Vec<Sample> },
    /// A stream's displayed content was replaced
    Replaced { stream: usize, samples: Vec<Sample> },
}

impl StreamEvent {
    /// Position of the stream this event belongs to
    pub fn stream(&self) -> usize {
        match self {
            Self::Appended { stream, .. } | Self::Replaced { stream, .. } => *stream,
        }
    }

    /// Replay this event onto another sink
    pub fn apply_to<S: RenderSink>(&self, sink: &mut S) {
        match self {
            Self::Appended { samples, .. } => sink.append(samples),
            Self::Replaced { samples, .. } => sink.replace_all(samples),
        }
    }
}

/// Sink publishing [`StreamEvent`]s for one stream
///
/// Uses `publish_immediate`, so when subscribers fall behind the oldest
/// events are dropped and the subscriber sees a lag instead of ingestion
/// stalling.
pub struct ChannelSink<'a> {
    stream: usize,
    publisher: ImmediatePublisher<
        'a,
        CriticalSectionRawMutex,
        StreamEvent,
        EVENT_CHANNEL_CAPACITY,
        EVENT_SUBSCRIBERS,
        EVENT_PUBLISHERS,
    >,
}

impl<'a> ChannelSink<'a> {
    pub fn new(stream: usize, channel: &'a StreamEventChannel) -> Self {
        Self {
            stream,
            publisher: channel.immediate_publisher(),
        }
    }
}

impl RenderSink for ChannelSink<'_> {
    fn append(&mut self, samples: &[Sample]) {
        self.publisher.publish_immediate(StreamEvent::Appended {
            stream: self.stream,
            samples: samples.to_vec(),
        });
    }

    fn replace_all(&mut self, samples: &[Sample]) {
        self.publisher.publish_immediate(StreamEvent::Replaced {
            stream: self.stream,
            samples: samples.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::SampleValue;
    use embassy_sync::pubsub::WaitResult;

    fn sample(index: u64) -> Sample {
        Sample::new(index, SampleValue::new(index as f32, 1.0))
    }

    #[test]
    fn test_mirror_sink_append_and_replace() {
        let mut sink = MirrorSink::new();
        sink.append(&[sample(0), sample(1)]);
        sink.append(&[sample(2)]);
        assert_eq!(sink.displayed().len(), 3);

        sink.replace_all(&[sample(2)]);
        assert_eq!(sink.displayed(), &[sample(2)]);
        assert_eq!(sink.appends(), 2);
        assert_eq!(sink.replacements(), 1);
    }

    #[test]
    fn test_channel_sink_publishes_events() {
        let channel = StreamEventChannel::new();
        let mut subscriber = channel.subscriber().unwrap();
        let mut sink = ChannelSink::new(3, &channel);

        sink.append(&[sample(7)]);
        sink.replace_all(&[]);

        match subscriber.try_next_message() {
            Some(WaitResult::Message(event)) => assert_eq!(
                event,
                StreamEvent::Appended {
                    stream: 3,
                    samples: alloc::vec![sample(7)],
                }
            ),
            _ => panic!("expected append event"),
        }
        match subscriber.try_next_message() {
            Some(WaitResult::Message(event)) => assert_eq!(
                event,
                StreamEvent::Replaced {
                    stream: 3,
                    samples: Vec::new(),
                }
            ),
            _ => panic!("expected replace event"),
        }
        assert!(subscriber.try_next_message().is_none());
    }

    #[test]
    fn test_event_replay_matches_direct_calls() {
        let channel = StreamEventChannel::new();
        let mut subscriber = channel.subscriber().unwrap();
        let mut sink = ChannelSink::new(0, &channel);
        let mut direct = MirrorSink::new();

        for batch in [[sample(0), sample(1)], [sample(2), sample(3)]] {
            sink.append(&batch);
            direct.append(&batch);
        }
        sink.replace_all(&[sample(3)]);
        direct.replace_all(&[sample(3)]);

        let mut replayed = MirrorSink::new();
        while let Some(WaitResult::Message(event)) = subscriber.try_next_message() {
            assert_eq!(event.stream(), 0);
            event.apply_to(&mut replayed);
        }
        assert_eq!(replayed.displayed(), direct.displayed());
    }
}

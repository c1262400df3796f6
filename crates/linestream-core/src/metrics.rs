//! Ingestion-rate instrumentation
//!
//! One [`RateMeter`] per pipeline counts every appended sample across all
//! streams. A fast cadence reads the count against the elapsed time to get
//! samples per second; a slower threshold resets the window so the figure
//! follows load changes and recovers after the host was suspended.
//!
//! A reset can land just before a read, in which case that read covers less
//! than a full read interval of data. That is accepted: the estimate is only
//! meant to be smooth, not exact.

use core::cell::Cell;
use core::fmt::Write;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Instant};
use log::debug;

/// Placeholder replaced by the rounded rate in label templates
pub const RATE_PLACEHOLDER: &str = "{rate}";

/// Count/time-window pair the rate is derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateAccumulator {
    /// Start of the current measurement window
    pub window_start: Instant,
    /// Samples appended since `window_start`
    pub sample_count: u64,
}

impl RateAccumulator {
    pub const fn new(window_start: Instant) -> Self {
        Self {
            window_start,
            sample_count: 0,
        }
    }
}

/// A published samples-per-second figure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateReading {
    samples: u64,
    elapsed_ms: u64,
}

impl RateReading {
    /// Reading for `samples` over `elapsed_ms`, or `None` if either is zero
    pub const fn from_window(samples: u64, elapsed_ms: u64) -> Option<Self> {
        if samples == 0 || elapsed_ms == 0 {
            None
        } else {
            Some(Self {
                samples,
                elapsed_ms,
            })
        }
    }

    pub const fn samples(&self) -> u64 {
        self.samples
    }

    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// `1000 * samples / elapsed_ms`
    pub fn samples_per_second(&self) -> f32 {
        (self.samples as f64 * 1000.0 / self.elapsed_ms as f64) as f32
    }

    /// Samples per second rounded half up, saturating at `u64::MAX`
    pub const fn rounded(&self) -> u64 {
        let samples = self.samples as u128;
        let elapsed = self.elapsed_ms as u128;
        let rate = (samples * 2000 + elapsed) / (2 * elapsed);
        if rate > u64::MAX as u128 {
            u64::MAX
        } else {
            rate as u64
        }
    }

    /// Render a display label, replacing every `{rate}` in `template`
    ///
    /// Fails if the label does not fit in `N` bytes.
    pub fn label<const N: usize>(
        &self,
        template: &str,
    ) -> Result<heapless::String<N>, core::fmt::Error> {
        let mut label = heapless::String::<N>::new();
        for (i, part) in template.split(RATE_PLACEHOLDER).enumerate() {
            if i > 0 {
                write!(label, "{}", self.rounded())?;
            }
            label.write_str(part)?;
        }
        Ok(label)
    }
}

#[derive(Debug, Clone, Copy)]
struct RateState {
    accumulator: RateAccumulator,
    latest: Option<RateReading>,
}

/// Process-wide rate meter
pub struct RateMeter {
    state: Mutex<CriticalSectionRawMutex, Cell<RateState>>,
    reset_interval: Duration,
}

impl RateMeter {
    /// Create a meter whose first window starts at `now`
    pub fn new(now: Instant, reset_interval: Duration) -> Self {
        Self {
            state: Mutex::new(Cell::new(RateState {
                accumulator: RateAccumulator::new(now),
                latest: None,
            })),
            reset_interval,
        }
    }

    fn update<U>(&self, f: impl FnOnce(&mut RateState) -> U) -> U {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    /// Count `count` newly appended samples
    pub fn record(&self, count: u64) {
        self.update(|state| {
            state.accumulator.sample_count = state.accumulator.sample_count.saturating_add(count);
        });
    }

    /// Current accumulator contents
    pub fn accumulator(&self) -> RateAccumulator {
        self.state.lock(|cell| cell.get().accumulator)
    }

    /// Derive the rate for the current window and publish it
    ///
    /// Returns `None`, leaving the last published reading in place, when
    /// nothing was counted or no time has passed.
    pub fn read(&self, now: Instant) -> Option<RateReading> {
        self.update(|state| {
            let elapsed = now
                .saturating_duration_since(state.accumulator.window_start)
                .as_millis();
            let reading = RateReading::from_window(state.accumulator.sample_count, elapsed)?;
            state.latest = Some(reading);
            Some(reading)
        })
    }

    /// Start a new window at `now`
    pub fn reset(&self, now: Instant) {
        self.update(|state| state.accumulator = RateAccumulator::new(now));
    }

    /// Fast-cadence body: read, then reset once the window is old enough
    pub fn on_tick(&self, now: Instant) -> Option<RateReading> {
        let reading = self.read(now);
        if let Some(reading) = reading {
            debug!(
                "Ingestion rate: {} samples/s over {} ms",
                reading.rounded(),
                reading.elapsed_ms()
            );
        }

        let window_start = self.accumulator().window_start;
        if now.saturating_duration_since(window_start) >= self.reset_interval {
            self.reset(now);
        }
        reading
    }

    /// Last published reading
    pub fn latest(&self) -> Option<RateReading> {
        self.state.lock(|cell| cell.get().latest)
    }

    pub fn reset_interval(&self) -> Duration {
        self.reset_interval
    }
}

//! Time axis reconstruction for laser readings, which carry no timestamp.

use crate::protocol::laser::LaserReading;
use crate::records::LaserSample;

/// Fixed laser sampling interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleClock {
    interval_ms: f64,
}

impl SampleClock {
    /// `None` for a zero, negative or non-finite rate, which disables laser ingestion.
    pub fn from_rate(rate_hz: f64) -> Option<Self> {
        if rate_hz.is_finite() && rate_hz > 0.0 {
            Some(Self {
                interval_ms: 1000.0 / rate_hz,
            })
        } else {
            None
        }
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    /// Index-derived time of the `index`-th reading; the first one is 0.
    pub fn index_time(&self, index: usize) -> f64 {
        index as f64 * self.interval_ms
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    anchor: f64,
    first: usize,
}

/// Assigns time-of-week to laser readings.
///
/// Borrowed mode stamps each reading with the caller's last navigation
/// time. Marker mode collects readings between a block start and its end,
/// then back-dates them from the anchor: the k-th reading from the end of
/// the block gets `anchor - (k - 2) * interval`.
#[derive(Debug)]
pub struct TimeReconstructor {
    clock: SampleClock,
    samples: Vec<LaserSample>,
    block: Option<OpenBlock>,
}

impl TimeReconstructor {
    pub fn new(clock: SampleClock) -> Self {
        Self {
            clock,
            samples: Vec::new(),
            block: None,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    fn push(&mut self, reading: &LaserReading, time_of_week: f64) {
        let index_time = self.clock.index_time(self.samples.len());
        self.samples.push(LaserSample {
            height: reading.height,
            signal_quality: reading.signal_quality,
            temperature: reading.temperature,
            time_of_week,
            index_time,
        });
    }

    /// Borrowed time-of-week. Zero means no navigation time was seen yet.
    pub fn push_stamped(&mut self, reading: &LaserReading, time_of_week: f64) {
        self.push(reading, time_of_week);
    }

    /// Opens a block anchored at `anchor`. Reopening an open block only moves
    /// the anchor; readings already collected stay in the block.
    pub fn open_block(&mut self, anchor: f64) {
        let first = self.block.map_or(self.samples.len(), |open| open.first);
        self.block = Some(OpenBlock { anchor, first });
    }

    pub fn block_open(&self) -> bool {
        self.block.is_some()
    }

    /// Adds a reading to the open block. Returns false when no block is open.
    pub fn push_in_block(&mut self, reading: &LaserReading) -> bool {
        if self.block.is_none() {
            return false;
        }
        self.push(reading, f64::NAN);
        true
    }

    /// Back-dates the open block. No-op without one.
    pub fn close_block(&mut self) {
        let Some(block) = self.block.take() else {
            return;
        };
        let interval = self.clock.interval_ms;
        let count = self.samples.len() - block.first;
        for (position, sample) in self.samples[block.first..].iter_mut().enumerate() {
            let from_last = (count - position) as f64;
            sample.time_of_week = block.anchor - (from_last - 2.0) * interval;
        }
    }

    /// Hands over every reading. A block still open keeps NaN times.
    pub fn finish(&mut self) -> Vec<LaserSample> {
        self.block = None;
        std::mem::take(&mut self.samples)
    }
}

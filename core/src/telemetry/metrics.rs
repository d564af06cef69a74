use serde::Serialize;
use std::ops::AddAssign;
use std::sync::Mutex;

use crate::prelude::{FaultKind, UnitClass};

/// Per-pass unit accounting.
///
/// Every unit lands in exactly one of `navigation`, `laser`, `markers`,
/// `checksum_failures`, `unknown_ids`, `unparseable` or `unrecognized`.
/// `salvaged` counts units that were kept despite a field-level failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DemuxStats {
    pub units: usize,
    pub navigation: usize,
    pub laser: usize,
    pub markers: usize,
    pub checksum_failures: usize,
    pub unknown_ids: usize,
    pub unparseable: usize,
    pub unrecognized: usize,
    pub salvaged: usize,
}

impl DemuxStats {
    /// Units that failed validation or could not be decoded.
    pub fn corrupt(&self) -> usize {
        self.checksum_failures + self.unparseable
    }

    /// Units of an unknown kind or shape.
    pub fn unrecognized_total(&self) -> usize {
        self.unknown_ids + self.unrecognized
    }

    pub fn accounted(&self) -> usize {
        self.navigation + self.laser + self.markers + self.corrupt() + self.unrecognized_total()
    }
}

impl AddAssign for DemuxStats {
    fn add_assign(&mut self, rhs: Self) {
        self.units += rhs.units;
        self.navigation += rhs.navigation;
        self.laser += rhs.laser;
        self.markers += rhs.markers;
        self.checksum_failures += rhs.checksum_failures;
        self.unknown_ids += rhs.unknown_ids;
        self.unparseable += rhs.unparseable;
        self.unrecognized += rhs.unrecognized;
        self.salvaged += rhs.salvaged;
    }
}

pub struct MetricsRecorder {
    inner: Mutex<DemuxStats>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DemuxStats::default()),
        }
    }

    pub fn record(&self, class: UnitClass) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.units += 1;
            match class {
                UnitClass::Navigation => stats.navigation += 1,
                UnitClass::Laser => stats.laser += 1,
                UnitClass::Marker => stats.markers += 1,
                UnitClass::Fault(FaultKind::ChecksumFailure) => stats.checksum_failures += 1,
                UnitClass::Fault(FaultKind::UnknownMessageId) => stats.unknown_ids += 1,
                UnitClass::Fault(FaultKind::UnparseableField) => stats.unparseable += 1,
                UnitClass::Fault(FaultKind::UnrecognizedLine) => stats.unrecognized += 1,
            }
        }
    }

    pub fn record_salvaged(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            stats.salvaged += 1;
        }
    }

    pub fn reset(&self) {
        if let Ok(mut stats) = self.inner.lock() {
            *stats = DemuxStats::default();
        }
    }

    pub fn snapshot(&self) -> DemuxStats {
        if let Ok(stats) = self.inner.lock() {
            *stats
        } else {
            DemuxStats::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_recorded_unit_is_accounted_once() {
        let recorder = MetricsRecorder::new();
        recorder.record(UnitClass::Navigation);
        recorder.record(UnitClass::Laser);
        recorder.record(UnitClass::Marker);
        recorder.record(UnitClass::Fault(FaultKind::ChecksumFailure));
        recorder.record(UnitClass::Fault(FaultKind::UnrecognizedLine));
        recorder.record_salvaged();

        let stats = recorder.snapshot();
        assert_eq!(stats.units, 5);
        assert_eq!(stats.accounted(), stats.units);
        assert_eq!(stats.salvaged, 1);
    }

    #[test]
    fn reset_clears_counters() {
        let recorder = MetricsRecorder::new();
        recorder.record(UnitClass::Laser);
        recorder.reset();
        assert_eq!(recorder.snapshot(), DemuxStats::default());
    }
}

use serde::Serialize;
use std::collections::BTreeMap;

use crate::records::{DecodedMessage, LaserSample};
use crate::telemetry::DemuxStats;

/// Unrecognized lines kept verbatim; the count in `DemuxStats` stays exact.
pub const UNRECOGNIZED_SAMPLE_LIMIT: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OtherIdentity {
    pub identity: String,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptFrame {
    /// 1-based frame position in the binary stream.
    pub index: usize,
    pub reason: String,
}

/// Diagnostic collections gathered during a pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Lines that failed validation or could not be decoded.
    pub corrupt_lines: Vec<String>,
    pub corrupt_frames: Vec<CorruptFrame>,
    /// Lines kept with at least one field lost.
    pub field_failures: Vec<String>,
    /// Every unit of an unconfigured identity, in stream order.
    pub other: Vec<OtherIdentity>,
    /// Distinct unconfigured identities, first-seen order.
    pub dropped: Vec<String>,
    pub unrecognized_lines: Vec<String>,
    /// Binary bytes that started no unit.
    pub skipped_bytes: usize,
}

impl Diagnostics {
    pub fn note_other(&mut self, identity: &str, length: usize) {
        self.other.push(OtherIdentity {
            identity: identity.to_string(),
            length,
        });
        if !self.dropped.iter().any(|name| name == identity) {
            self.dropped.push(identity.to_string());
        }
    }

    pub fn note_unrecognized(&mut self, line: &str) {
        if self.unrecognized_lines.len() < UNRECOGNIZED_SAMPLE_LIMIT {
            self.unrecognized_lines.push(line.to_string());
        }
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.corrupt_lines.extend(other.corrupt_lines);
        self.corrupt_frames.extend(other.corrupt_frames);
        self.field_failures.extend(other.field_failures);
        for entry in other.other {
            self.note_other(&entry.identity, entry.length);
        }
        for line in other.unrecognized_lines {
            self.note_unrecognized(&line);
        }
        self.skipped_bytes += other.skipped_bytes;
    }
}

/// Everything one demultiplexing pass produces.
#[derive(Debug, Clone, Default)]
pub struct DemuxOutput {
    /// Decoded rows keyed by kind name, stream order.
    pub messages: BTreeMap<String, Vec<DecodedMessage>>,
    pub laser: Vec<LaserSample>,
    pub diagnostics: Diagnostics,
    pub stats: DemuxStats,
}

impl DemuxOutput {
    pub fn merge(&mut self, other: DemuxOutput) {
        for (kind, rows) in other.messages {
            self.messages.entry(kind).or_default().extend(rows);
        }
        self.laser.extend(other.laser);
        self.diagnostics.merge(other.diagnostics);
        self.stats += other.stats;
    }
}

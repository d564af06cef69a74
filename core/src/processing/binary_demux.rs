use crate::prelude::{FaultKind, LineStage, UnitClass};
use crate::processing::diagnostics::{CorruptFrame, DemuxOutput, Diagnostics};
use crate::processing::timing::{SampleClock, TimeReconstructor};
use crate::protocol::laser::LaserBlockParser;
use crate::protocol::ubx::{FrameValues, UbxReader};
use crate::records::{MarkerKind, RawRecord, SchemaSet};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Frame-by-frame pass over the navigation half of a binary log.
pub struct BinaryDemultiplexer {
    schema: SchemaSet,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl BinaryDemultiplexer {
    pub fn new(schema: SchemaSet) -> Self {
        Self {
            schema,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("binary-demux"),
        }
    }

    pub fn run(&self, bytes: &[u8]) -> DemuxOutput {
        self.metrics.reset();
        let mut output = DemuxOutput::default();
        let mut reader = UbxReader::new(bytes);

        for frame in reader.by_ref() {
            let decoded = match frame.result {
                Ok(decoded) => decoded,
                Err(err) => {
                    self.logger
                        .detail(&format!("frame {} rejected: {}", frame.index, err));
                    self.metrics.record(UnitClass::Fault(err.fault()));
                    output.diagnostics.corrupt_frames.push(CorruptFrame {
                        index: frame.index,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let Some(kind) = self.schema.by_identity(&decoded.identity) else {
                self.metrics.record(UnitClass::Fault(FaultKind::UnknownMessageId));
                output
                    .diagnostics
                    .note_other(&decoded.identity, decoded.length);
                continue;
            };

            let message = match decoded.values {
                FrameValues::Named(values) => kind.message_from_named(&values),
                FrameValues::Positional(fields) => {
                    if fields.is_text() {
                        self.metrics.record_salvaged();
                        output
                            .diagnostics
                            .field_failures
                            .push(String::from_utf8_lossy(frame.raw).trim_end().to_string());
                    }
                    kind.message_from_values(fields.into_values())
                }
            };
            match message {
                Some(message) => {
                    self.metrics.record(UnitClass::Navigation);
                    output
                        .messages
                        .entry(kind.name.clone())
                        .or_default()
                        .push(message);
                }
                None => {
                    self.logger.detail(&format!(
                        "frame {} ({}) does not fit its schema",
                        frame.index, decoded.identity
                    ));
                    self.metrics.record(UnitClass::Fault(FaultKind::UnparseableField));
                    output.diagnostics.corrupt_frames.push(CorruptFrame {
                        index: frame.index,
                        reason: format!("{} does not fit its schema", decoded.identity),
                    });
                }
            }
        }

        output.diagnostics.skipped_bytes = reader.skipped_bytes();
        output.stats = self.metrics.snapshot();
        self.logger.record(&format!(
            "binary pass: {} frames, {} navigation, {} corrupt, {} other, {} bytes skipped",
            output.stats.units,
            output.stats.navigation,
            output.stats.corrupt(),
            output.stats.unknown_ids,
            output.diagnostics.skipped_bytes
        ));
        output
    }
}

/// Line pass over the laser half of a binary log, `# iTOW <ms>` ... `# end`
/// blocks back-dated from their anchor.
pub struct MarkerLaserReader {
    recon: TimeReconstructor,
    parser: LaserBlockParser,
    diagnostics: Diagnostics,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl MarkerLaserReader {
    pub fn new(clock: SampleClock) -> Self {
        Self {
            recon: TimeReconstructor::new(clock),
            parser: LaserBlockParser::new(),
            diagnostics: Diagnostics::default(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("laser-blocks"),
        }
    }

    fn open_block(&mut self, line: &str, payload: &str) {
        self.parser.begin_block();
        match payload
            .split_whitespace()
            .next()
            .and_then(|token| token.parse::<f64>().ok())
        {
            Some(anchor) => {
                self.recon.open_block(anchor);
                self.metrics.record(UnitClass::Marker);
            }
            None => {
                self.logger.warn(&format!("block anchor is not numeric: {}", line));
                self.recon.open_block(f64::NAN);
                self.metrics.record(UnitClass::Fault(FaultKind::UnparseableField));
                self.diagnostics.corrupt_lines.push(line.to_string());
            }
        }
    }
}

impl LineStage for MarkerLaserReader {
    fn begin(&mut self) {
        self.recon.finish();
        self.parser.begin_block();
        self.diagnostics = Diagnostics::default();
        self.metrics.reset();
    }

    fn consume(&mut self, line: &str) {
        match RawRecord::classify_laser_stream(line) {
            RawRecord::Marker {
                kind: MarkerKind::BlockStart,
                payload,
            } => self.open_block(line, payload),
            RawRecord::Marker { .. } => {
                self.recon.close_block();
                self.metrics.record(UnitClass::Marker);
            }
            RawRecord::LaserLine(text) if self.recon.block_open() => {
                let reading = self.parser.parse(text);
                if reading.parse_failed {
                    self.logger.detail(&format!("could not parse laser line: {}", text));
                    self.metrics.record_salvaged();
                    self.diagnostics.field_failures.push(text.to_string());
                }
                self.recon.push_in_block(&reading);
                self.metrics.record(UnitClass::Laser);
            }
            _ => {
                self.metrics
                    .record(UnitClass::Fault(FaultKind::UnrecognizedLine));
                self.diagnostics.note_unrecognized(line);
            }
        }
    }

    fn finish(&mut self) -> DemuxOutput {
        if self.recon.block_open() {
            self.logger
                .warn("laser block still open at end of stream; its readings keep no time");
        }
        let stats = self.metrics.snapshot();
        self.logger.record(&format!(
            "laser pass: {} lines, {} readings, {} salvaged, {} unrecognized",
            stats.units, stats.laser, stats.salvaged, stats.unrecognized
        ));
        DemuxOutput {
            laser: self.recon.finish(),
            diagnostics: std::mem::take(&mut self.diagnostics),
            stats,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::drive_lines;
    use crate::protocol::nmea::with_checksum;
    use crate::protocol::ubx::build_frame;

    fn att_frame(itow: u32, pitch: i32) -> Vec<u8> {
        let mut payload = vec![0u8; 32];
        payload[0..4].copy_from_slice(&itow.to_le_bytes());
        payload[12..16].copy_from_slice(&pitch.to_le_bytes());
        build_frame(0x01, 0x05, &payload)
    }

    #[test]
    fn frames_are_routed_by_identity() {
        let mut stream = att_frame(1000, 100_000);
        stream.extend_from_slice(&build_frame(0x0a, 0x04, &[0; 4]));
        stream.extend_from_slice(&build_frame(0x10, 0x14, &[0; 3]));
        stream.extend_from_slice(with_checksum("$GNGGA,1").as_bytes());
        stream.extend_from_slice(b"\r\n");
        stream.extend_from_slice(&att_frame(2000, 200_000));

        let output = BinaryDemultiplexer::new(SchemaSet::ubx_navigation()).run(&stream);
        let stats = output.stats;
        assert_eq!(stats.units, 5);
        assert_eq!(stats.navigation, 2);
        assert_eq!(stats.unknown_ids, 2);
        assert_eq!(stats.unparseable, 1);
        assert_eq!(stats.accounted(), stats.units);

        let att = &output.messages["ATT"];
        assert_eq!(att[1].number("pitch"), Some(2.0));
        assert_eq!(output.diagnostics.dropped, vec!["UBX-0A-04", "GNGGA"]);
        assert_eq!(output.diagnostics.other[0].length, 4);
        assert_eq!(output.diagnostics.corrupt_frames[0].index, 3);
    }

    #[test]
    fn corrupt_frame_does_not_lose_the_next_one() {
        let mut bad = att_frame(1000, 0);
        let last = bad.len() - 1;
        bad[last] ^= 0x55;
        let mut stream = bad;
        stream.extend_from_slice(&att_frame(2000, 0));

        let output = BinaryDemultiplexer::new(SchemaSet::ubx_navigation()).run(&stream);
        assert_eq!(output.stats.checksum_failures, 1);
        assert_eq!(output.messages["ATT"].len(), 1);
        assert_eq!(output.messages["ATT"][0].number("iTOW"), Some(2000.0));
    }

    #[test]
    fn marker_blocks_are_back_dated() {
        let log = "# iTOW 1000\r\nD 1.0 0.9 20.0\r\nD 2.0 0.9 20.0\r\n# end\r\nD 9.0\r\n# iTOW x\r\nD 3.0\r\n";
        let mut reader = MarkerLaserReader::new(SampleClock::from_rate(5.0).unwrap());
        let output = drive_lines(&mut reader, log.as_bytes()).unwrap();

        let times: Vec<f64> = output.laser.iter().map(|s| s.time_of_week).collect();
        assert_eq!(&times[..2], &[1000.0, 1200.0]);
        assert!(times[2].is_nan());

        let stats = output.stats;
        assert_eq!(stats.units, 7);
        assert_eq!(stats.markers, 2);
        assert_eq!(stats.laser, 3);
        assert_eq!(stats.unrecognized, 1);
        assert_eq!(stats.unparseable, 1);
        assert_eq!(stats.accounted(), stats.units);
        assert_eq!(output.diagnostics.corrupt_lines, vec!["# iTOW x"]);
    }
}

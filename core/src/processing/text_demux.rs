use std::collections::BTreeMap;

use crate::prelude::{FaultKind, LineStage, UnitClass};
use crate::processing::diagnostics::{DemuxOutput, Diagnostics};
use crate::processing::timing::{SampleClock, TimeReconstructor};
use crate::protocol::laser::LaserBlockParser;
use crate::protocol::nmea::{NmeaSentenceParser, SentenceParse};
use crate::records::{DecodedMessage, RawRecord, SchemaSet};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Demultiplexer for logs that interleave NMEA sentences and laser lines.
///
/// Laser lines are stamped with the time-of-week of the latest primary
/// navigation message. A run of consecutive laser lines is one block for
/// variant detection.
pub struct TextDemultiplexer {
    schema: SchemaSet,
    laser: Option<TimeReconstructor>,
    parser: LaserBlockParser,
    in_laser_run: bool,
    last_time_of_week: f64,
    messages: BTreeMap<String, Vec<DecodedMessage>>,
    diagnostics: Diagnostics,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl TextDemultiplexer {
    /// `clock` is `None` when laser ingestion is disabled; laser lines are
    /// then counted and discarded.
    pub fn new(schema: SchemaSet, clock: Option<SampleClock>) -> Self {
        Self {
            schema,
            laser: clock.map(TimeReconstructor::new),
            parser: LaserBlockParser::new(),
            in_laser_run: false,
            last_time_of_week: 0.0,
            messages: BTreeMap::new(),
            diagnostics: Diagnostics::default(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("text-demux"),
        }
    }

    /// Last primary time-of-week seen in this pass; 0 before the first one.
    pub fn last_time_of_week(&self) -> f64 {
        self.last_time_of_week
    }

    fn route_sentence(&mut self, line: &str) {
        let (id, fields) = match NmeaSentenceParser::parse(line) {
            SentenceParse::Parsed { id, fields } => (id, fields),
            SentenceParse::Error(raw) => {
                self.logger.detail(&format!("checksum failure: {}", raw));
                self.metrics.record(UnitClass::Fault(FaultKind::ChecksumFailure));
                self.diagnostics.corrupt_lines.push(raw);
                return;
            }
        };

        let Some(kind) = self.schema.by_identity(&id) else {
            self.logger.detail(&format!("dropping unconfigured sentence {}", id));
            self.metrics.record(UnitClass::Fault(FaultKind::UnknownMessageId));
            self.diagnostics.note_other(&id, line.len());
            return;
        };

        let salvaged = fields.is_text();
        let Some(message) = kind.message_from_values(fields.into_values()) else {
            self.logger.detail(&format!(
                "{} carries {} fields where {} are expected",
                id,
                line.matches(',').count(),
                kind.fields.len()
            ));
            self.metrics.record(UnitClass::Fault(FaultKind::UnparseableField));
            self.diagnostics.corrupt_lines.push(line.to_string());
            return;
        };

        if salvaged {
            self.metrics.record_salvaged();
            self.diagnostics.field_failures.push(line.to_string());
        }
        if self.schema.primary.as_deref() == Some(kind.name.as_str()) {
            match message.number(&kind.time_field) {
                Some(t) if t.is_finite() => self.last_time_of_week = t,
                _ => self
                    .logger
                    .detail(&format!("{} without a usable {}", id, kind.time_field)),
            }
        }
        self.messages
            .entry(kind.name.clone())
            .or_default()
            .push(message);
        self.metrics.record(UnitClass::Navigation);
    }

    fn route_laser(&mut self, line: &str) {
        self.metrics.record(UnitClass::Laser);
        let Some(recon) = self.laser.as_mut() else {
            return;
        };
        if !self.in_laser_run {
            self.parser.begin_block();
            self.in_laser_run = true;
        }
        let reading = self.parser.parse(line);
        if reading.parse_failed {
            self.logger.detail(&format!("could not parse laser line: {}", line));
            self.metrics.record_salvaged();
            self.diagnostics.field_failures.push(line.to_string());
        }
        recon.push_stamped(&reading, self.last_time_of_week);
    }
}

impl LineStage for TextDemultiplexer {
    fn begin(&mut self) {
        self.last_time_of_week = 0.0;
        self.in_laser_run = false;
        self.parser.begin_block();
        self.messages.clear();
        self.diagnostics = Diagnostics::default();
        self.metrics.reset();
        if let Some(recon) = self.laser.as_mut() {
            recon.finish();
        }
    }

    fn consume(&mut self, line: &str) {
        match RawRecord::classify_interleaved(line) {
            RawRecord::LaserLine(text) => self.route_laser(text),
            other => {
                self.in_laser_run = false;
                match other {
                    RawRecord::Marker { .. } => self.metrics.record(UnitClass::Marker),
                    RawRecord::NavigationText(text) => self.route_sentence(text),
                    _ => {
                        self.metrics
                            .record(UnitClass::Fault(FaultKind::UnrecognizedLine));
                        self.diagnostics.note_unrecognized(line);
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> DemuxOutput {
        let stats = self.metrics.snapshot();
        self.logger.record(&format!(
            "text pass: {} lines, {} navigation, {} laser, {} corrupt, {} unrecognized",
            stats.units,
            stats.navigation,
            stats.laser,
            stats.corrupt(),
            stats.unrecognized_total()
        ));
        DemuxOutput {
            messages: std::mem::take(&mut self.messages),
            laser: self
                .laser
                .as_mut()
                .map(TimeReconstructor::finish)
                .unwrap_or_default(),
            diagnostics: std::mem::take(&mut self.diagnostics),
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prelude::drive_lines;
    use crate::protocol::nmea::with_checksum;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn pins1(itow: f64, pitch: f64) -> String {
        with_checksum(&format!(
            "$PINS1,{},2200,1,0,0.01,{},1.5,0,0,0,11.0,48.0,500.0,0,0,0",
            itow, pitch
        ))
    }

    fn run(log: &str, rate: f64) -> DemuxOutput {
        let mut demux = TextDemultiplexer::new(SchemaSet::inertial_nmea(), SampleClock::from_rate(rate));
        drive_lines(&mut demux, log.as_bytes()).unwrap()
    }

    #[test]
    fn laser_lines_borrow_latest_primary_time() {
        let log = format!(
            "# header\nD 10.0 0.9 20.0\n{}\nD 11.0 0.9 20.0\nD 12.0 0.8 20.5\n{}\nD 13.0 0.9 20.0\n",
            pins1(1000.0, 0.1),
            pins1(1100.0, 0.2)
        );
        let output = run(&log, 10.0);
        let times: Vec<f64> = output.laser.iter().map(|s| s.time_of_week).collect();
        assert_eq!(times, vec![0.0, 1000.0, 1000.0, 1100.0]);
        assert_eq!(output.messages["PINS1"].len(), 2);
        assert_eq!(output.stats.markers, 1);
        assert_eq!(output.stats.accounted(), output.stats.units);
    }

    #[test]
    fn faults_are_classified_and_the_pass_completes() {
        let good = pins1(1000.0, 0.1);
        let (body, ck) = good.split_at(good.len() - 2);
        let bad_checksum = format!("{}{:02X}", body, u8::from_str_radix(ck, 16).unwrap() ^ 0xff);
        let log = format!(
            "{}\n{}\n{}\n{}\nD abc\nrubbish\n\n{}\n",
            bad_checksum,
            with_checksum("$GPGGA,1,2,3"),
            with_checksum("$PSTRB,2200,1"),
            pins1(1000.0, 0.1),
            with_checksum("$PSTRB,2200,1000,1,7")
        );
        let output = run(&log, 10.0);
        let stats = output.stats;
        assert_eq!(stats.units, 8);
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.unknown_ids, 1);
        assert_eq!(stats.unparseable, 1);
        assert_eq!(stats.unrecognized, 2);
        assert_eq!(stats.navigation, 2);
        assert_eq!(stats.laser, 1);
        assert_eq!(stats.salvaged, 1);
        assert_eq!(stats.accounted(), stats.units);
        assert_eq!(output.diagnostics.dropped, vec!["GPGGA"]);
        assert_eq!(output.diagnostics.corrupt_lines.len(), 2);
        assert!(output.laser[0].height.is_nan());
    }

    #[test]
    fn zero_rate_counts_but_discards_laser() {
        let log = format!("{}\nD 10.0 0.9 20.0\n", pins1(1000.0, 0.1));
        let output = run(&log, 0.0);
        assert!(output.laser.is_empty());
        assert_eq!(output.stats.laser, 1);
    }

    #[test]
    fn new_pass_resets_time_of_week() {
        let mut demux = TextDemultiplexer::new(SchemaSet::inertial_nmea(), SampleClock::from_rate(10.0));
        let first = format!("{}\n", pins1(5000.0, 0.0));
        drive_lines(&mut demux, first.as_bytes()).unwrap();
        assert_eq!(demux.last_time_of_week(), 5000.0);

        let output = drive_lines(&mut demux, "D 1.0\n".as_bytes()).unwrap();
        assert_eq!(output.laser[0].time_of_week, 0.0);
        assert!(output.messages.is_empty());
    }

    #[test]
    fn text_fallback_is_kept_and_salvaged() {
        let line = with_checksum("$PSTRB,2200,1000,A,7");
        let output = run(&format!("{}\n", line), 10.0);
        assert_eq!(output.messages["PSTRB"].len(), 1);
        assert_eq!(output.stats.salvaged, 1);
        assert_eq!(output.diagnostics.field_failures, vec![line]);
    }

    #[test]
    fn randomized_text_logs_account_for_every_line() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let mut log = Vec::new();
            for _ in 0..rng.gen_range(1..40) {
                match rng.gen_range(0..6) {
                    0 => log.extend_from_slice(pins1(rng.gen_range(0.0..6e5), 0.1).as_bytes()),
                    1 => {
                        let mut line = pins1(1000.0, 0.1).into_bytes();
                        let at = rng.gen_range(1..line.len());
                        line[at] = b'#';
                        log.extend_from_slice(&line);
                    }
                    2 => log.extend_from_slice(format!("D {:.2} 0.9 20.0", rng.gen_range(1.0..50.0)).as_bytes()),
                    3 => log.extend_from_slice(b"# iTOW 1000"),
                    4 => log.extend_from_slice(with_checksum("$GPGSV,1,2").as_bytes()),
                    _ => {
                        let mut noise = vec![0u8; rng.gen_range(0..24)];
                        rng.fill(&mut noise[..]);
                        log.extend_from_slice(&noise);
                    }
                }
                log.extend_from_slice(b"\r\n");
            }

            let mut demux =
                TextDemultiplexer::new(SchemaSet::inertial_nmea(), SampleClock::from_rate(10.0));
            let output = drive_lines(&mut demux, log.as_slice()).unwrap();
            let stats = output.stats;
            assert_eq!(stats.accounted(), stats.units);
            assert_eq!(stats.units, log.iter().filter(|&&b| b == b'\n').count());
        }
    }
}

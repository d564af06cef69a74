use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;

use crate::config::IngestConfig;
use crate::prelude::{drive_lines, IngestError, IngestResult, LogFormat, SplitMode};
use crate::processing::attitude::{AttitudeCorrector, CorrectedLaserSeries};
use crate::processing::binary_demux::{BinaryDemultiplexer, MarkerLaserReader};
use crate::processing::diagnostics::{DemuxOutput, Diagnostics};
use crate::processing::series::SampleSeries;
use crate::processing::split::{split_file, SplitPaths, SplitReport};
use crate::processing::text_demux::TextDemultiplexer;
use crate::processing::timing::SampleClock;
use crate::records::{laser_schema, LaserSample};
use crate::telemetry::{DemuxStats, LogManager};

/// A fully ingested log: one series per configured kind, the laser series
/// and the diagnostics of every pass.
#[derive(Debug, Clone)]
pub struct LogSession {
    config: IngestConfig,
    series: BTreeMap<String, SampleSeries>,
    laser: Option<SampleSeries>,
    diagnostics: Diagnostics,
    stats: DemuxStats,
    split: Option<SplitReport>,
}

impl LogSession {
    /// Validates `config`, then runs every pass over the source.
    ///
    /// Only configuration problems, a missing source and I/O failures are
    /// errors; malformed content never is.
    pub fn load(config: IngestConfig) -> IngestResult<Self> {
        let logger = LogManager::new("session");
        config.validate()?;
        if !config.source.is_file() {
            return Err(IngestError::MissingSource(config.source.clone()));
        }

        let clock = SampleClock::from_rate(config.laser_rate_hz);
        let mut split = None;
        let output = match config.format {
            LogFormat::InterleavedText => {
                let file =
                    File::open(&config.source).map_err(|err| IngestError::io(&config.source, err))?;
                let mut demux = TextDemultiplexer::new(config.schema.clone(), clock);
                drive_lines(&mut demux, BufReader::new(file))?
            }
            LogFormat::BinaryWithMarkers => {
                split = split_file(&config.source, config.split)?;
                let (navigation, laser) = Self::stream_paths(&config);
                let bytes = fs::read(&navigation).map_err(|err| IngestError::io(&navigation, err))?;
                let mut output = BinaryDemultiplexer::new(config.schema.clone()).run(&bytes);
                if let Some(clock) = clock {
                    let file = File::open(&laser).map_err(|err| IngestError::io(&laser, err))?;
                    let mut reader = MarkerLaserReader::new(clock);
                    output.merge(drive_lines(&mut reader, BufReader::new(file))?);
                }
                output
            }
        };

        let session = Self::assemble(config, output, split);
        logger.record(&format!(
            "{}: {} units, {} laser readings, {} kinds",
            session.config.source.display(),
            session.stats.units,
            session.laser.as_ref().map_or(0, SampleSeries::len),
            session.series.len()
        ));
        Ok(session)
    }

    fn stream_paths(config: &IngestConfig) -> (PathBuf, PathBuf) {
        match config.split {
            SplitMode::Never => (config.source.clone(), config.source.clone()),
            _ => {
                let paths = SplitPaths::for_source(&config.source);
                (paths.navigation, paths.laser)
            }
        }
    }

    fn assemble(config: IngestConfig, mut output: DemuxOutput, split: Option<SplitReport>) -> Self {
        let series = config
            .schema
            .kinds
            .iter()
            .map(|kind| {
                let rows = output.messages.remove(&kind.name).unwrap_or_default();
                (kind.name.clone(), SampleSeries::build(kind.clone(), rows))
            })
            .collect();
        let laser = config.laser_enabled().then(|| {
            SampleSeries::build(
                laser_schema(),
                output.laser.drain(..).map(LaserSample::into_message).collect(),
            )
        });
        Self {
            config,
            series,
            laser,
            diagnostics: output.diagnostics,
            stats: output.stats,
            split,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Series of a configured kind; present (possibly empty) for every kind.
    pub fn series(&self, kind: &str) -> Option<&SampleSeries> {
        self.series.get(kind)
    }

    pub fn all_series(&self) -> impl Iterator<Item = &SampleSeries> {
        self.series.values()
    }

    /// `None` when laser ingestion is disabled.
    pub fn laser(&self) -> Option<&SampleSeries> {
        self.laser.as_ref()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }

    /// Report of the split run by this load, if one was written.
    pub fn split_report(&self) -> Option<SplitReport> {
        self.split
    }

    /// Rebuilt on every call. `None` when there is no laser series or
    /// correction is switched off.
    pub fn corrected_laser(&self) -> Option<CorrectedLaserSeries<'_>> {
        if !self.config.correct_laser {
            return None;
        }
        let laser = self.laser.as_ref()?;
        let source = self.config.attitude.clone()?;
        let attitude = self.series.get(&source.kind);
        Some(AttitudeCorrector::new(source, self.config.calibration).correct(attitude, laser))
    }

    /// Every series restricted to `start <= t < end`. Diagnostics and counts
    /// stay those of the full pass.
    pub fn subset(&self, start: f64, end: f64) -> LogSession {
        Self {
            config: self.config.clone(),
            series: self
                .series
                .iter()
                .map(|(name, series)| (name.clone(), series.between(start, end)))
                .collect(),
            laser: self.laser.as_ref().map(|laser| laser.between(start, end)),
            diagnostics: self.diagnostics.clone(),
            stats: self.stats,
            split: self.split,
        }
    }
}

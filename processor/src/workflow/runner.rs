use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use navlasercore::math::StatsHelper;
use navlasercore::processing::{LogSession, OtherIdentity, SampleSeries, SplitReport};
use navlasercore::telemetry::DemuxStats;
use serde::Serialize;

/// Intervals shown per series in the data check.
const INTERVAL_SAMPLE: usize = 5;
/// Entries shown from each diagnostic collection.
const DIAGNOSTIC_SAMPLE: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    pub kind: String,
    pub rows: usize,
    pub first_intervals: Vec<f64>,
}

impl SeriesSummary {
    fn of(series: &SampleSeries) -> Self {
        Self {
            kind: series.kind().to_string(),
            rows: series.len(),
            first_intervals: StatsHelper::leading_intervals(
                &series.times().to_vec(),
                INTERVAL_SAMPLE,
            ),
        }
    }
}

/// Corrected laser columns as handed to plotting tools.
#[derive(Debug, Clone, Serialize)]
pub struct LaserTrace {
    pub time: Vec<f64>,
    pub raw_height: Vec<f64>,
    pub corrected_height: Vec<f64>,
    pub pitch: Vec<f64>,
    pub roll: Vec<f64>,
    pub corrected_count: usize,
    pub mean_corrected_height: f64,
    /// RMS of raw minus corrected height over corrected readings.
    pub rms_correction: f64,
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub source: String,
    pub stats: DemuxStats,
    pub series: Vec<SeriesSummary>,
    pub laser: Option<LaserTrace>,
    pub other_sample: Vec<OtherIdentity>,
    pub corrupt_sample: Vec<String>,
    pub dropped: Vec<String>,
    pub skipped_bytes: usize,
    pub split: Option<SplitReport>,
}

impl WorkflowResult {
    pub fn from_session(session: &LogSession) -> Self {
        let diagnostics = session.diagnostics();
        let mut series: Vec<SeriesSummary> = session.all_series().map(SeriesSummary::of).collect();
        if let Some(laser) = session.laser() {
            series.push(SeriesSummary::of(laser));
        }

        let laser = session.corrected_laser().map(|corrected| {
            let corrected_height = corrected.corrected_height().to_vec();
            let raw_height = corrected.raw_height().to_vec();
            let adjustments: Vec<f64> = raw_height
                .iter()
                .zip(&corrected_height)
                .map(|(raw, fixed)| raw - fixed)
                .collect();
            LaserTrace {
                time: corrected.times().to_vec(),
                raw_height,
                pitch: corrected.pitch().to_vec(),
                roll: corrected.roll().to_vec(),
                corrected_count: StatsHelper::finite_count(&corrected_height),
                mean_corrected_height: StatsHelper::finite_mean(&corrected_height),
                rms_correction: StatsHelper::finite_rms(&adjustments),
                corrected_height,
                failure: corrected.failure().map(ToString::to_string),
            }
        });

        let corrupt_sample = diagnostics
            .corrupt_lines
            .iter()
            .cloned()
            .chain(
                diagnostics
                    .corrupt_frames
                    .iter()
                    .map(|frame| format!("frame {}: {}", frame.index, frame.reason)),
            )
            .take(DIAGNOSTIC_SAMPLE)
            .collect();

        Self {
            source: session.config().source.display().to_string(),
            stats: session.stats(),
            series,
            laser,
            other_sample: diagnostics
                .other
                .iter()
                .take(DIAGNOSTIC_SAMPLE)
                .cloned()
                .collect(),
            corrupt_sample,
            dropped: diagnostics.dropped.clone(),
            skipped_bytes: diagnostics.skipped_bytes,
            split: session.split_report(),
        }
    }

    /// Human-readable data check.
    pub fn summary_lines(&self) -> Vec<String> {
        let stats = &self.stats;
        let mut lines = vec![format!(
            "{}: {} units ({} navigation, {} laser, {} markers, {} corrupt, {} unrecognized, {} salvaged)",
            self.source,
            stats.units,
            stats.navigation,
            stats.laser,
            stats.markers,
            stats.corrupt(),
            stats.unrecognized_total(),
            stats.salvaged
        )];
        if let Some(split) = &self.split {
            lines.push(format!(
                "split: {} blocks, {} laser bytes, {} navigation bytes",
                split.blocks, split.laser_bytes, split.navigation_bytes
            ));
        }
        for summary in &self.series {
            lines.push(format!(
                "{:>8}: {:>7} rows, first intervals {:?}",
                summary.kind, summary.rows, summary.first_intervals
            ));
        }
        if let Some(laser) = &self.laser {
            lines.push(format!(
                "laser: {} of {} heights corrected, mean {:.3}, rms correction {:.3}",
                laser.corrected_count,
                laser.corrected_height.len(),
                laser.mean_corrected_height,
                laser.rms_correction
            ));
            if let Some(failure) = &laser.failure {
                lines.push(format!("laser correction failed: {}", failure));
            }
        }
        if !self.dropped.is_empty() {
            lines.push(format!("dropped kinds: {}", self.dropped.join(", ")));
        }
        for other in &self.other_sample {
            lines.push(format!("other: {} ({} bytes)", other.identity, other.length));
        }
        for corrupt in &self.corrupt_sample {
            lines.push(format!("corrupt: {}", corrupt));
        }
        lines
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let ingest = self.config.to_ingest_config();
        let session = LogSession::load(ingest)
            .with_context(|| format!("ingesting {}", self.config.log.display()))?;
        let session = match self.config.time_window {
            Some([start, end]) => session.subset(start, end),
            None => session,
        };
        Ok(WorkflowResult::from_session(&session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{write_log, GeneratorConfig};
    use navlasercore::prelude::LogFormat;

    #[test]
    fn runner_recovers_level_height_from_text_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flight.txt");
        let generator = GeneratorConfig {
            epochs: 40,
            corrupt_every: Some(7),
            ..Default::default()
        };
        write_log(&path, &generator).unwrap();

        let cfg = WorkflowConfig::from_args(path, LogFormat::InterleavedText, None, None);
        let result = Runner::new(cfg).execute().unwrap();

        assert_eq!(result.stats.checksum_failures, 40 / 7);
        assert_eq!(result.stats.accounted(), result.stats.units);
        let laser = result.laser.as_ref().unwrap();
        assert!(laser.failure.is_none());
        assert!(laser.corrected_count > 0);
        assert!((laser.mean_corrected_height - generator.base_height).abs() < 1e-6);
        assert!(result.summary_lines()[0].contains("units"));
    }

    #[test]
    fn runner_processes_marker_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flight.ubx");
        let generator = GeneratorConfig {
            format: LogFormat::BinaryWithMarkers,
            epochs: 20,
            ..Default::default()
        };
        write_log(&path, &generator).unwrap();

        let cfg = WorkflowConfig::from_args(
            path,
            LogFormat::BinaryWithMarkers,
            Some(generator.laser_rate_hz()),
            None,
        );
        let result = Runner::new(cfg).execute().unwrap();

        assert_eq!(result.split.map(|s| s.blocks), Some(20));
        let pvat = result.series.iter().find(|s| s.kind == "PVAT").unwrap();
        assert_eq!(pvat.rows, 20);
        assert_eq!(pvat.first_intervals[0], 200.0);
        let laser = result.laser.unwrap();
        assert_eq!(laser.time.len(), 20 * generator.laser_per_epoch);
        assert!((laser.mean_corrected_height - generator.base_height).abs() < 0.05);
    }

    #[test]
    fn time_window_limits_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flight.txt");
        let generator = GeneratorConfig {
            epochs: 10,
            ..Default::default()
        };
        write_log(&path, &generator).unwrap();

        let mut cfg = WorkflowConfig::from_args(path, LogFormat::InterleavedText, None, None);
        let start = generator.start_tow_ms;
        cfg.time_window = Some([start, start + 5.0 * generator.epoch_ms()]);
        let result = Runner::new(cfg).execute().unwrap();
        let pins = result.series.iter().find(|s| s.kind == "PINS1").unwrap();
        assert_eq!(pins.rows, 5);
    }

    #[test]
    fn missing_log_is_reported_with_context() {
        let cfg = WorkflowConfig::from_args(
            "no/such/flight.txt".into(),
            LogFormat::InterleavedText,
            None,
            None,
        );
        let err = Runner::new(cfg).execute().unwrap_err();
        assert!(format!("{:#}", err).contains("source file not found"));
    }
}

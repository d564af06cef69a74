use anyhow::Context;
use navlasercore::config::{AttitudeSource, CalibrationParameters, IngestConfig};
use navlasercore::prelude::{LogFormat, SplitMode};
use navlasercore::records::SchemaSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn enabled() -> bool {
    true
}

/// Driver-level settings. Anything left out falls back to the preset of
/// the chosen format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub log: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    #[serde(default)]
    pub laser_rate_hz: Option<f64>,
    #[serde(default)]
    pub split: Option<SplitMode>,
    #[serde(default)]
    pub calibration: CalibrationParameters,
    #[serde(default)]
    pub schema: Option<SchemaSet>,
    #[serde(default)]
    pub attitude: Option<AttitudeSource>,
    #[serde(default = "enabled")]
    pub correct_laser: bool,
    /// `[start, end)` time-of-week window applied after ingest.
    #[serde(default)]
    pub time_window: Option<[f64; 2]>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        log: PathBuf,
        format: LogFormat,
        laser_rate_hz: Option<f64>,
        split: Option<SplitMode>,
    ) -> Self {
        Self {
            log,
            format,
            laser_rate_hz,
            split,
            calibration: CalibrationParameters::default(),
            schema: None,
            attitude: None,
            correct_laser: true,
            time_window: None,
        }
    }

    pub fn to_ingest_config(&self) -> IngestConfig {
        let mut config = match self.format {
            LogFormat::InterleavedText => IngestConfig::inertial_text(&self.log),
            LogFormat::BinaryWithMarkers => IngestConfig::ubx_with_markers(&self.log),
        };
        if let Some(rate) = self.laser_rate_hz {
            config.laser_rate_hz = rate;
        }
        if let Some(split) = self.split {
            config.split = split;
        }
        if let Some(schema) = &self.schema {
            config.schema = schema.clone();
        }
        if let Some(attitude) = &self.attitude {
            config.attitude = Some(attitude.clone());
        }
        config.calibration = self.calibration;
        config.correct_laser = self.correct_laser;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_keeps_preset_defaults() {
        let cfg = WorkflowConfig::from_args(
            PathBuf::from("flight.ubx"),
            LogFormat::BinaryWithMarkers,
            None,
            Some(SplitMode::Always),
        );
        let ingest = cfg.to_ingest_config();
        assert_eq!(ingest.laser_rate_hz, 5.0);
        assert_eq!(ingest.split, SplitMode::Always);
        assert_eq!(ingest.schema, SchemaSet::ubx_navigation());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"log: flight.ubx\nformat: binary_with_markers\nlaser_rate_hz: 2.5\nsplit: never\ncalibration:\n  boresight_offset: 0.8\n  pitch_bias: 0.1\ntime_window: [1000.0, 5000.0]\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.format, LogFormat::BinaryWithMarkers);
        assert_eq!(cfg.split, Some(SplitMode::Never));
        assert_eq!(cfg.time_window, Some([1000.0, 5000.0]));

        let ingest = cfg.to_ingest_config();
        assert_eq!(ingest.laser_rate_hz, 2.5);
        assert_eq!(ingest.calibration.boresight_offset, 0.8);
        assert_eq!(ingest.calibration.pitch_scale, 1.0);
    }

    #[test]
    fn config_load_reports_missing_file() {
        let err = WorkflowConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("reading workflow config"));
    }
}

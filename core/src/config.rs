use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::prelude::{IngestError, IngestResult, LogFormat, SplitMode};
use crate::records::{SchemaSet, LASER_KIND};

/// Mounting geometry and attitude calibration. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParameters {
    /// Distance from the navigation reference point to the laser footprint
    /// at zero tilt, same unit as the laser height.
    pub boresight_offset: f64,
    pub pitch_bias: f64,
    pub roll_bias: f64,
    pub pitch_scale: f64,
    pub roll_scale: f64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            boresight_offset: 0.0,
            pitch_bias: 0.0,
            roll_bias: 0.0,
            pitch_scale: 1.0,
            roll_scale: 1.0,
        }
    }
}

impl CalibrationParameters {
    pub fn resolve_pitch(&self, degrees: f64) -> f64 {
        (degrees - self.pitch_bias) * self.pitch_scale
    }

    pub fn resolve_roll(&self, degrees: f64) -> f64 {
        (degrees - self.roll_bias) * self.roll_scale
    }

    fn validate(&self) -> IngestResult<()> {
        let values = [
            ("boresight_offset", self.boresight_offset),
            ("pitch_bias", self.pitch_bias),
            ("roll_bias", self.roll_bias),
            ("pitch_scale", self.pitch_scale),
            ("roll_scale", self.roll_scale),
        ];
        match values.iter().find(|(_, value)| !value.is_finite()) {
            Some((name, value)) => Err(IngestError::InvalidConfig(format!(
                "calibration {} must be finite, got {}",
                name, value
            ))),
            None => Ok(()),
        }
    }
}

fn one() -> f64 {
    1.0
}

fn enabled() -> bool {
    true
}

/// Where the corrector finds attitude.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttitudeSource {
    /// Kind name in the schema set.
    pub kind: String,
    pub pitch_field: String,
    pub roll_field: String,
    /// Converts the stored angle unit to degrees.
    #[serde(default = "one")]
    pub degrees_per_unit: f64,
}

impl AttitudeSource {
    pub fn new(kind: &str, pitch_field: &str, roll_field: &str, degrees_per_unit: f64) -> Self {
        Self {
            kind: kind.to_string(),
            pitch_field: pitch_field.to_string(),
            roll_field: roll_field.to_string(),
            degrees_per_unit,
        }
    }
}

/// Everything a session needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub source: PathBuf,
    #[serde(default)]
    pub format: LogFormat,
    pub schema: SchemaSet,
    /// Laser sample rate; 0 disables laser ingestion.
    #[serde(default)]
    pub laser_rate_hz: f64,
    #[serde(default)]
    pub calibration: CalibrationParameters,
    #[serde(default)]
    pub attitude: Option<AttitudeSource>,
    #[serde(default)]
    pub split: SplitMode,
    #[serde(default = "enabled")]
    pub correct_laser: bool,
}

impl IngestConfig {
    /// `$PINS1`/`$PSTRB` sentences interleaved with 10 Hz laser lines.
    /// Attitude is stored in radians.
    pub fn inertial_text(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            format: LogFormat::InterleavedText,
            schema: SchemaSet::inertial_nmea(),
            laser_rate_hz: 10.0,
            calibration: CalibrationParameters::default(),
            attitude: Some(AttitudeSource::new(
                "PINS1",
                "pitch",
                "roll",
                180.0 / std::f64::consts::PI,
            )),
            split: SplitMode::Never,
            correct_laser: true,
        }
    }

    /// UBX navigation with `# iTOW` ... `# end` laser blocks at 5 Hz.
    pub fn ubx_with_markers(source: impl AsRef<Path>) -> Self {
        Self {
            source: source.as_ref().to_path_buf(),
            format: LogFormat::BinaryWithMarkers,
            schema: SchemaSet::ubx_navigation(),
            laser_rate_hz: 5.0,
            calibration: CalibrationParameters::default(),
            attitude: Some(AttitudeSource::new("PVAT", "vehPitch", "vehRoll", 1.0)),
            split: SplitMode::IfMissing,
            correct_laser: true,
        }
    }

    pub fn laser_enabled(&self) -> bool {
        self.laser_rate_hz > 0.0
    }

    /// Checks the configuration once, before any file is touched.
    pub fn validate(&self) -> IngestResult<()> {
        self.schema.validate(self.format)?;
        if self.schema.by_name(LASER_KIND).is_some() {
            return Err(IngestError::InvalidSchema(format!(
                "kind name `{}` is reserved for laser readings",
                LASER_KIND
            )));
        }
        if !self.laser_rate_hz.is_finite() || self.laser_rate_hz < 0.0 {
            return Err(IngestError::InvalidConfig(format!(
                "laser rate must be a non-negative number of Hz, got {}",
                self.laser_rate_hz
            )));
        }
        self.calibration.validate()?;

        if !(self.correct_laser && self.laser_enabled()) {
            return Ok(());
        }
        let attitude = self.attitude.as_ref().ok_or_else(|| {
            IngestError::InvalidConfig("laser correction needs an attitude source".into())
        })?;
        let kind = self.schema.by_name(&attitude.kind).ok_or_else(|| {
            IngestError::InvalidConfig(format!("attitude kind `{}` is not configured", attitude.kind))
        })?;
        for field in [&attitude.pitch_field, &attitude.roll_field] {
            if kind.field_index(field).is_none() {
                return Err(IngestError::InvalidConfig(format!(
                    "attitude kind `{}` has no field `{}`",
                    kind.name, field
                )));
            }
        }
        if !attitude.degrees_per_unit.is_finite() || attitude.degrees_per_unit == 0.0 {
            return Err(IngestError::InvalidConfig(
                "degrees_per_unit must be finite and non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        IngestConfig::inertial_text("log.txt").validate().unwrap();
        IngestConfig::ubx_with_markers("log.ubx").validate().unwrap();
    }

    #[test]
    fn calibration_defaults_are_identity() {
        let calibration = CalibrationParameters::default();
        assert_eq!(calibration.resolve_pitch(3.5), 3.5);
        assert_eq!(calibration.resolve_roll(-1.0), -1.0);
    }

    #[test]
    fn bias_is_removed_before_scaling() {
        let calibration = CalibrationParameters {
            pitch_bias: 1.0,
            pitch_scale: 2.0,
            ..Default::default()
        };
        assert_eq!(calibration.resolve_pitch(4.0), 6.0);
    }

    #[test]
    fn negative_rate_is_rejected() {
        let mut config = IngestConfig::inertial_text("log.txt");
        config.laser_rate_hz = -1.0;
        assert!(matches!(config.validate(), Err(IngestError::InvalidConfig(_))));
    }

    #[test]
    fn attitude_fields_must_exist() {
        let mut config = IngestConfig::ubx_with_markers("log.ubx");
        config.attitude = Some(AttitudeSource::new("PVAT", "pitch", "vehRoll", 1.0));
        assert!(config.validate().is_err());

        config.laser_rate_hz = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reserved_laser_name_is_rejected() {
        let mut config = IngestConfig::inertial_text("log.txt");
        config.schema.kinds[1].name = LASER_KIND.into();
        assert!(matches!(config.validate(), Err(IngestError::InvalidSchema(_))));
    }
}

//! Attitude interpolation onto the laser time axis and rigid-body height
//! correction:
//!
//! `corrected = h * cos(pitch) * cos(roll) - offset * sin(pitch)`

use ndarray::{Array1, ArrayView1};

use crate::config::{AttitudeSource, CalibrationParameters};
use crate::math::InterpHelper;
use crate::processing::series::SampleSeries;
use crate::records::laser::LASER_FIELDS;
use crate::telemetry::LogManager;

const HEIGHT_FIELD: &str = LASER_FIELDS[0];

/// Why a correction could not be computed at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("attitude series `{0}` is not available")]
    MissingSeries(String),
    #[error("attitude series `{0}` has no rows")]
    EmptySeries(String),
    #[error("series `{kind}` has no numeric column `{field}`")]
    MissingColumn { kind: String, field: String },
    #[error("`{kind}` has {times} times but {values} values")]
    ShapeMismatch {
        kind: String,
        times: usize,
        values: usize,
    },
}

/// Laser readings with resolved attitude and corrected height.
///
/// Borrows the laser series; owns the derived arrays.
#[derive(Debug, Clone)]
pub struct CorrectedLaserSeries<'a> {
    laser: &'a SampleSeries,
    pitch: Array1<f64>,
    roll: Array1<f64>,
    corrected: Array1<f64>,
    failure: Option<GeometryError>,
}

impl<'a> CorrectedLaserSeries<'a> {
    pub fn len(&self) -> usize {
        self.corrected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrected.is_empty()
    }

    pub fn laser(&self) -> &'a SampleSeries {
        self.laser
    }

    pub fn times(&self) -> ArrayView1<'a, f64> {
        self.laser.times()
    }

    pub fn raw_height(&self) -> ArrayView1<'a, f64> {
        self.laser
            .column(HEIGHT_FIELD)
            .unwrap_or_else(|| ArrayView1::from(&[] as &[f64]))
    }

    /// Degrees, after bias removal and scaling.
    pub fn pitch(&self) -> ArrayView1<'_, f64> {
        self.pitch.view()
    }

    pub fn roll(&self) -> ArrayView1<'_, f64> {
        self.roll.view()
    }

    pub fn corrected_height(&self) -> ArrayView1<'_, f64> {
        self.corrected.view()
    }

    /// Set when the whole series degraded to NaN.
    pub fn failure(&self) -> Option<&GeometryError> {
        self.failure.as_ref()
    }
}

struct Resolved {
    pitch: Array1<f64>,
    roll: Array1<f64>,
    corrected: Array1<f64>,
}

pub struct AttitudeCorrector {
    source: AttitudeSource,
    calibration: CalibrationParameters,
    logger: LogManager,
}

impl AttitudeCorrector {
    pub fn new(source: AttitudeSource, calibration: CalibrationParameters) -> Self {
        Self {
            source,
            calibration,
            logger: LogManager::new("attitude"),
        }
    }

    /// Never fails: a series that cannot be interpolated yields all-NaN
    /// results of the laser length and one warning.
    pub fn correct<'a>(
        &self,
        attitude: Option<&SampleSeries>,
        laser: &'a SampleSeries,
    ) -> CorrectedLaserSeries<'a> {
        match self.resolve(attitude, laser) {
            Ok(resolved) => CorrectedLaserSeries {
                laser,
                pitch: resolved.pitch,
                roll: resolved.roll,
                corrected: resolved.corrected,
                failure: None,
            },
            Err(err) => {
                self.logger
                    .warn(&format!("laser correction unavailable: {}", err));
                let nan = Array1::from_elem(laser.len(), f64::NAN);
                CorrectedLaserSeries {
                    laser,
                    pitch: nan.clone(),
                    roll: nan.clone(),
                    corrected: nan,
                    failure: Some(err),
                }
            }
        }
    }

    fn numeric<'s>(series: &'s SampleSeries, field: &str) -> Result<ArrayView1<'s, f64>, GeometryError> {
        series.column(field).ok_or_else(|| GeometryError::MissingColumn {
            kind: series.kind().to_string(),
            field: field.to_string(),
        })
    }

    fn resolve(
        &self,
        attitude: Option<&SampleSeries>,
        laser: &SampleSeries,
    ) -> Result<Resolved, GeometryError> {
        let attitude =
            attitude.ok_or_else(|| GeometryError::MissingSeries(self.source.kind.clone()))?;
        let heights = Self::numeric(laser, HEIGHT_FIELD)?;
        let laser_times = laser.times();
        if laser.is_empty() {
            return Ok(Resolved {
                pitch: Array1::zeros(0),
                roll: Array1::zeros(0),
                corrected: Array1::zeros(0),
            });
        }
        if attitude.is_empty() {
            return Err(GeometryError::EmptySeries(attitude.kind().to_string()));
        }

        let times = attitude.times();
        let pitch = Self::numeric(attitude, &self.source.pitch_field)?;
        let roll = Self::numeric(attitude, &self.source.roll_field)?;
        for values in [pitch, roll] {
            if values.len() != times.len() {
                return Err(GeometryError::ShapeMismatch {
                    kind: attitude.kind().to_string(),
                    times: times.len(),
                    values: values.len(),
                });
            }
        }
        if heights.len() != laser_times.len() {
            return Err(GeometryError::ShapeMismatch {
                kind: laser.kind().to_string(),
                times: laser_times.len(),
                values: heights.len(),
            });
        }

        let scale = self.source.degrees_per_unit;
        let resolve_at = |t: f64, values: ArrayView1<'_, f64>| {
            // A zero stamp means no navigation time had been seen.
            if t == 0.0 {
                f64::NAN
            } else {
                InterpHelper::bracketed(times, values, t) * scale
            }
        };
        let resolved_pitch: Array1<f64> = laser_times
            .iter()
            .map(|&t| self.calibration.resolve_pitch(resolve_at(t, pitch)))
            .collect();
        let resolved_roll: Array1<f64> = laser_times
            .iter()
            .map(|&t| self.calibration.resolve_roll(resolve_at(t, roll)))
            .collect();

        let offset = self.calibration.boresight_offset;
        let corrected = heights
            .iter()
            .zip(resolved_pitch.iter().zip(resolved_roll.iter()))
            .map(|(&h, (&p, &r))| {
                let (p, r) = (p.to_radians(), r.to_radians());
                h * p.cos() * r.cos() - offset * p.sin()
            })
            .collect();

        Ok(Resolved {
            pitch: resolved_pitch,
            roll: resolved_roll,
            corrected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{laser_schema, FieldValue, KindSchema, LaserSample};
    use crate::records::DecodedMessage;

    fn attitude(times: &[f64], pitch: &[f64], roll: &[f64]) -> SampleSeries {
        let schema = KindSchema::new("ATT", "NAV-ATT", &["iTOW", "pitch", "roll"], "iTOW");
        let rows = times
            .iter()
            .zip(pitch.iter().zip(roll))
            .map(|(&t, (&p, &r))| {
                DecodedMessage::new(
                    "ATT",
                    vec![
                        ("iTOW".into(), FieldValue::Number(t)),
                        ("pitch".into(), FieldValue::Number(p)),
                        ("roll".into(), FieldValue::Number(r)),
                    ],
                )
            })
            .collect();
        SampleSeries::build(schema, rows)
    }

    fn laser(samples: &[(f64, f64)]) -> SampleSeries {
        let rows = samples
            .iter()
            .map(|&(t, h)| {
                LaserSample {
                    height: h,
                    signal_quality: f64::NAN,
                    temperature: f64::NAN,
                    time_of_week: t,
                    index_time: 0.0,
                }
                .into_message()
            })
            .collect();
        SampleSeries::build(laser_schema(), rows)
    }

    fn corrector(calibration: CalibrationParameters) -> AttitudeCorrector {
        AttitudeCorrector::new(AttitudeSource::new("ATT", "pitch", "roll", 1.0), calibration)
    }

    #[test]
    fn pitch_is_interpolated_between_brackets() {
        let att = attitude(&[0.0, 1000.0, 2000.0], &[0.0, 10.0, 20.0], &[0.0; 3]);
        let las = laser(&[(500.0, 10.0), (2500.0, 10.0)]);
        let corrected = corrector(CalibrationParameters::default()).correct(Some(&att), &las);
        assert_eq!(corrected.pitch()[0], 5.0);
        assert!(corrected.pitch()[1].is_nan());
        assert!(corrected.corrected_height()[1].is_nan());
        assert!(corrected.failure().is_none());
    }

    #[test]
    fn level_attitude_leaves_height_unchanged() {
        let att = attitude(&[0.0, 1000.0, 2000.0], &[0.0; 3], &[0.0; 3]);
        let las = laser(&[(500.0, 12.34), (1500.0, 7.5)]);
        let corrected = corrector(CalibrationParameters::default()).correct(Some(&att), &las);
        assert_eq!(corrected.corrected_height().to_vec(), vec![12.34, 7.5]);
        assert_eq!(corrected.raw_height().to_vec(), vec![12.34, 7.5]);
    }

    #[test]
    fn tilt_and_offset_follow_the_rigid_body_formula() {
        let att = attitude(&[0.0, 1000.0], &[30.0, 30.0], &[60.0, 60.0]);
        let las = laser(&[(500.0, 10.0)]);
        let calibration = CalibrationParameters {
            boresight_offset: 2.0,
            ..Default::default()
        };
        let corrected = corrector(calibration).correct(Some(&att), &las);
        let expected = 10.0 * 30f64.to_radians().cos() * 60f64.to_radians().cos()
            - 2.0 * 30f64.to_radians().sin();
        assert!((corrected.corrected_height()[0] - expected).abs() < 1e-12);
    }

    #[test]
    fn bias_and_scale_apply_in_degrees() {
        let att = attitude(&[0.0, 1000.0], &[4.0, 4.0], &[0.0, 0.0]);
        let las = laser(&[(500.0, 1.0)]);
        let calibration = CalibrationParameters {
            pitch_bias: 1.0,
            pitch_scale: 0.5,
            ..Default::default()
        };
        let corrected = corrector(calibration).correct(Some(&att), &las);
        assert_eq!(corrected.pitch()[0], 1.5);
    }

    #[test]
    fn unknown_time_is_not_corrected() {
        let att = attitude(&[0.0, 1000.0], &[0.0, 0.0], &[0.0, 0.0]);
        let las = laser(&[(0.0, 5.0)]);
        let corrected = corrector(CalibrationParameters::default()).correct(Some(&att), &las);
        assert!(corrected.corrected_height()[0].is_nan());
    }

    #[test]
    fn missing_or_empty_attitude_degrades_to_nan() {
        let las = laser(&[(500.0, 5.0), (600.0, 6.0)]);
        let corrected = corrector(CalibrationParameters::default()).correct(None, &las);
        assert_eq!(corrected.len(), 2);
        assert!(corrected.corrected_height().iter().all(|v| v.is_nan()));
        assert!(matches!(corrected.failure(), Some(GeometryError::MissingSeries(_))));

        let empty = attitude(&[], &[], &[]);
        let corrected = corrector(CalibrationParameters::default()).correct(Some(&empty), &las);
        assert!(matches!(corrected.failure(), Some(GeometryError::EmptySeries(_))));
        assert_eq!(corrected.pitch().len(), 2);
    }

    #[test]
    fn missing_attitude_column_is_reported() {
        let att = attitude(&[0.0, 1000.0], &[0.0, 0.0], &[0.0, 0.0]);
        let las = laser(&[(500.0, 5.0)]);
        let corrected = AttitudeCorrector::new(
            AttitudeSource::new("ATT", "vehPitch", "roll", 1.0),
            CalibrationParameters::default(),
        )
        .correct(Some(&att), &las);
        assert!(matches!(
            corrected.failure(),
            Some(GeometryError::MissingColumn { .. })
        ));
        assert!(corrected.corrected_height()[0].is_nan());
    }
}

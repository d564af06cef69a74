use crate::records::message::{DecodedMessage, FieldValue};
use crate::records::schema::KindSchema;

pub const LASER_KIND: &str = "Laser";
pub const LASER_TIME_FIELD: &str = "iTOW";
pub const LASER_FIELDS: [&str; 5] = ["h", "signQ", "T", LASER_TIME_FIELD, "iTOW2"];

/// Schema of the laser report kind. Not configurable: the laser parser defines it.
pub fn laser_schema() -> KindSchema {
    KindSchema::new(LASER_KIND, LASER_KIND, &LASER_FIELDS, LASER_TIME_FIELD)
}

/// One laser range reading with its reconstructed time axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserSample {
    pub height: f64,
    pub signal_quality: f64,
    pub temperature: f64,
    /// Reconstructed time-of-week; NaN when reconstruction failed, 0 when no
    /// navigation time had been seen yet.
    pub time_of_week: f64,
    /// Index-derived time (first reading = 0). Cross-check only.
    pub index_time: f64,
}

impl LaserSample {
    pub fn into_message(self) -> DecodedMessage {
        let values = [
            self.height,
            self.signal_quality,
            self.temperature,
            self.time_of_week,
            self.index_time,
        ];
        DecodedMessage::new(
            LASER_KIND,
            LASER_FIELDS
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), FieldValue::Number(value)))
                .collect(),
        )
    }
}

//! Core of the navigation/laser-altimeter log processor.
//!
//! Demultiplexes NMEA or UBX navigation traffic from laser range reports,
//! reconstructs the laser time axis and corrects laser heights for vehicle
//! attitude.

pub mod config;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod protocol;
pub mod records;
pub mod telemetry;

pub use config::{AttitudeSource, CalibrationParameters, IngestConfig};
pub use prelude::{IngestError, IngestResult, LogFormat, SplitMode};
pub use processing::{CorrectedLaserSeries, LogSession, SampleSeries};

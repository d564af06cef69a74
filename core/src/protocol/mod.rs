pub mod laser;
pub mod nmea;
pub mod ubx;

pub use laser::{LaserBlockParser, LaserReading, LaserVariant};
pub use nmea::{ChecksumValidator, NmeaSentenceParser, SentenceFields, SentenceParse};
pub use ubx::{DecodeError, DecodedFrame, Frame, FrameValues, UbxReader};

//! Data model shared by the parsers, the demultiplexers and the series builder.

pub mod laser;
pub mod message;
pub mod raw;
pub mod schema;

pub use laser::{laser_schema, LaserSample, LASER_FIELDS, LASER_KIND};
pub use message::{DecodedMessage, FieldValue};
pub use raw::{MarkerKind, RawRecord};
pub use schema::{KindSchema, SchemaSet};

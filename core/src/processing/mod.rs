pub mod attitude;
pub mod binary_demux;
pub mod diagnostics;
pub mod series;
pub mod session;
pub mod split;
pub mod text_demux;
pub mod timing;

pub use attitude::{AttitudeCorrector, CorrectedLaserSeries, GeometryError};
pub use binary_demux::{BinaryDemultiplexer, MarkerLaserReader};
pub use diagnostics::{CorruptFrame, DemuxOutput, Diagnostics, OtherIdentity};
pub use series::{Column, SampleSeries};
pub use session::LogSession;
pub use split::{split_file, split_laser_blocks, SplitOutput, SplitPaths, SplitReport};
pub use text_demux::TextDemultiplexer;
pub use timing::{SampleClock, TimeReconstructor};

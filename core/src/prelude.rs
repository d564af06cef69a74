use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::PathBuf;

use crate::processing::diagnostics::DemuxOutput;

/// Source layout of the recorded log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// ASCII NMEA sentences interleaved with laser lines.
    #[default]
    InterleavedText,
    /// UBX binary stream with `# iTOW` / `# end` delimited laser blocks.
    BinaryWithMarkers,
}

/// Whether the marker split runs before a binary ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SplitMode {
    Always,
    #[default]
    IfMissing,
    Never,
}

/// Outcome category of one demultiplexed unit (line or frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitClass {
    Navigation,
    Laser,
    Marker,
    Fault(FaultKind),
}

/// Recoverable fault categories. None of these stops a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    ChecksumFailure,
    UnknownMessageId,
    UnparseableField,
    UnrecognizedLine,
}

/// Errors that stop a pipeline before parsing starts.
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("source file not found: {}", .0.display())]
    MissingSource(PathBuf),
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("read failure: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

/// A line-oriented demultiplexing pass.
pub trait LineStage {
    /// Resets all per-pass state.
    fn begin(&mut self);
    /// Classifies and routes one line, terminator already stripped.
    fn consume(&mut self, line: &str);
    /// Closes open state and hands over the accumulated output.
    fn finish(&mut self) -> DemuxOutput;
}

/// Drives `stage` over every line of `reader`. Invalid UTF-8 is replaced, never rejected.
pub fn drive_lines<S, R>(stage: &mut S, mut reader: R) -> IngestResult<DemuxOutput>
where
    S: LineStage + ?Sized,
    R: BufRead,
{
    stage.begin();
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        stage.consume(line.trim_end_matches(&['\r', '\n'][..]));
    }
    Ok(stage.finish())
}

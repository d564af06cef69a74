//! One-shot split of a binary log into its navigation and laser halves.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::prelude::{IngestError, IngestResult, SplitMode};
use crate::telemetry::LogManager;

const BLOCK_START: &[u8] = b"# iTOW";
const BLOCK_END: &[u8] = b"# end";
/// Bytes after the end marker searched for its line terminator.
const TERMINATOR_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SplitReport {
    pub blocks: usize,
    pub laser_bytes: usize,
    pub navigation_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SplitOutput {
    pub navigation: Vec<u8>,
    pub laser: Vec<u8>,
    pub report: SplitReport,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Moves every `# iTOW` ... `# end` block, through the end marker's line
/// terminator, to the laser output. Everything else stays navigation.
///
/// The terminator must follow within a short window of the end marker;
/// otherwise the block ends at the marker itself so the binary frames that
/// follow are not swallowed.
///
/// Stops at the first start marker without a matching end; the rest of the
/// buffer is navigation. Every input byte lands in exactly one output.
pub fn split_laser_blocks(bytes: &[u8]) -> SplitOutput {
    let mut output = SplitOutput::default();
    let mut cursor = 0;

    while let Some(start) = find(bytes, BLOCK_START, cursor) {
        let Some(end) = find(bytes, BLOCK_END, start) else {
            break;
        };
        let marker_end = end + BLOCK_END.len();
        let window = &bytes[..(marker_end + TERMINATOR_WINDOW).min(bytes.len())];
        let block_end = find(window, b"\n", marker_end).map_or(marker_end, |nl| nl + 1);
        output.navigation.extend_from_slice(&bytes[cursor..start]);
        output.laser.extend_from_slice(&bytes[start..block_end]);
        output.report.blocks += 1;
        cursor = block_end;
    }
    output.navigation.extend_from_slice(&bytes[cursor..]);

    output.report.navigation_bytes = output.navigation.len();
    output.report.laser_bytes = output.laser.len();
    output
}

/// `<stem>_GNSS.ubx` and `<stem>_Laser.dat` beside the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPaths {
    pub navigation: PathBuf,
    pub laser: PathBuf,
}

impl SplitPaths {
    pub fn for_source(source: &Path) -> Self {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            navigation: source.with_file_name(format!("{}_GNSS.ubx", stem)),
            laser: source.with_file_name(format!("{}_Laser.dat", stem)),
        }
    }

    pub fn exist(&self) -> bool {
        self.navigation.is_file() && self.laser.is_file()
    }
}

/// Runs the split for `source` according to `mode`.
///
/// Returns `None` when nothing was written: `Never`, or `IfMissing` with both
/// outputs already present.
pub fn split_file(source: &Path, mode: SplitMode) -> IngestResult<Option<SplitReport>> {
    let logger = LogManager::new("split");
    let paths = SplitPaths::for_source(source);
    match mode {
        SplitMode::Never => return Ok(None),
        SplitMode::IfMissing if paths.exist() => {
            logger.detail(&format!(
                "reusing {} and {}",
                paths.navigation.display(),
                paths.laser.display()
            ));
            return Ok(None);
        }
        _ => {}
    }

    if !source.is_file() {
        return Err(IngestError::MissingSource(source.to_path_buf()));
    }
    let bytes = fs::read(source).map_err(|err| IngestError::io(source, err))?;
    let output = split_laser_blocks(&bytes);
    fs::write(&paths.navigation, &output.navigation)
        .map_err(|err| IngestError::io(&paths.navigation, err))?;
    fs::write(&paths.laser, &output.laser).map_err(|err| IngestError::io(&paths.laser, err))?;

    logger.record(&format!(
        "split {}: {} laser blocks, {} laser bytes, {} navigation bytes",
        source.display(),
        output.report.blocks,
        output.report.laser_bytes,
        output.report.navigation_bytes
    ));
    Ok(Some(output.report))
}

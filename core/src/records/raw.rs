/// Marker lines recognised in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Comment,
    BlockStart,
    BlockEnd,
}

/// One classified line of a log. Lives only for the duration of a dispatch.
///
/// Binary frames travel as [`crate::protocol::ubx::Frame`] instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawRecord<'a> {
    NavigationText(&'a str),
    LaserLine(&'a str),
    Marker { kind: MarkerKind, payload: &'a str },
    Unrecognized(&'a [u8]),
}

pub const LASER_SENTINEL: char = 'D';
pub const COMMENT_PREFIX: char = '#';
pub const BLOCK_START_TAG: &str = "# iTOW";
pub const BLOCK_END_TAG: &str = "# end";

impl<'a> RawRecord<'a> {
    /// Classifies a line of the interleaved text log, highest priority first.
    pub fn classify_interleaved(line: &'a str) -> Self {
        if line.starts_with(COMMENT_PREFIX) {
            RawRecord::Marker {
                kind: MarkerKind::Comment,
                payload: line,
            }
        } else if line.contains('$') {
            RawRecord::NavigationText(line)
        } else if line.starts_with(LASER_SENTINEL) {
            RawRecord::LaserLine(line)
        } else {
            RawRecord::Unrecognized(line.as_bytes())
        }
    }

    /// Classifies a line of a marker-delimited laser stream.
    pub fn classify_laser_stream(line: &'a str) -> Self {
        if let Some(pos) = line.find(BLOCK_START_TAG) {
            RawRecord::Marker {
                kind: MarkerKind::BlockStart,
                payload: &line[pos + BLOCK_START_TAG.len()..],
            }
        } else if let Some(pos) = line.find(BLOCK_END_TAG) {
            RawRecord::Marker {
                kind: MarkerKind::BlockEnd,
                payload: &line[pos + BLOCK_END_TAG.len()..],
            }
        } else if line.starts_with(LASER_SENTINEL) {
            RawRecord::LaserLine(line)
        } else {
            RawRecord::Unrecognized(line.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_priority_prefers_comment_then_nmea() {
        assert!(matches!(
            RawRecord::classify_interleaved("# $PINS1 in a comment"),
            RawRecord::Marker { kind: MarkerKind::Comment, .. }
        ));
        assert!(matches!(
            RawRecord::classify_interleaved("D 1.0 $"),
            RawRecord::NavigationText(_)
        ));
        assert!(matches!(
            RawRecord::classify_interleaved("D 1.0"),
            RawRecord::LaserLine(_)
        ));
        assert!(matches!(
            RawRecord::classify_interleaved(""),
            RawRecord::Unrecognized(_)
        ));
    }

    #[test]
    fn block_start_payload_carries_anchor() {
        match RawRecord::classify_laser_stream("# iTOW 123400") {
            RawRecord::Marker {
                kind: MarkerKind::BlockStart,
                payload,
            } => assert_eq!(payload.trim(), "123400"),
            other => panic!("unexpected {:?}", other),
        }
    }
}

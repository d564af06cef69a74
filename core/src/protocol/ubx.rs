//! u-blox UBX framing: `B5 62 class id len(u16 LE) payload ck_a ck_b`.
//!
//! Known messages are decoded through declarative field tables. Scaling
//! follows the usual receiver conventions: angles and lat/lon in degrees,
//! heights and velocities left in mm and mm/s.

use crate::prelude::FaultKind;
use crate::protocol::nmea::{NmeaSentenceParser, SentenceFields, SentenceParse};

pub const SYNC_CHAR_1: u8 = 0xb5;
pub const SYNC_CHAR_2: u8 = 0x62;
pub const HEADER_LEN: usize = 6;
pub const CHECKSUM_LEN: usize = 2;
const MAX_SENTENCE_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    U1,
    I1,
    U2,
    I2,
    U4,
    I4,
}

impl Wire {
    pub const fn size(self) -> usize {
        match self {
            Wire::U1 | Wire::I1 => 1,
            Wire::U2 | Wire::I2 => 2,
            Wire::U4 | Wire::I4 => 4,
        }
    }

    fn read(self, bytes: &[u8]) -> f64 {
        match self {
            Wire::U1 => bytes[0] as f64,
            Wire::I1 => bytes[0] as i8 as f64,
            Wire::U2 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Wire::I2 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Wire::U4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Wire::I4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub offset: usize,
    pub wire: Wire,
    pub scale: f64,
}

const fn field(name: &'static str, offset: usize, wire: Wire, scale: f64) -> FieldSpec {
    FieldSpec {
        name,
        offset,
        wire,
        scale,
    }
}

#[derive(Debug)]
pub struct UbxLayout {
    pub identity: &'static str,
    pub class: u8,
    pub id: u8,
    pub min_len: usize,
    pub fields: &'static [FieldSpec],
}

const NAV_ATT: &[FieldSpec] = &[
    field("iTOW", 0, Wire::U4, 1.0),
    field("version", 4, Wire::U1, 1.0),
    field("roll", 8, Wire::I4, 1e-5),
    field("pitch", 12, Wire::I4, 1e-5),
    field("heading", 16, Wire::I4, 1e-5),
    field("accRoll", 20, Wire::U4, 1e-5),
    field("accPitch", 24, Wire::U4, 1e-5),
    field("accHeading", 28, Wire::U4, 1e-5),
];

const NAV_PVT: &[FieldSpec] = &[
    field("iTOW", 0, Wire::U4, 1.0),
    field("year", 4, Wire::U2, 1.0),
    field("month", 6, Wire::U1, 1.0),
    field("day", 7, Wire::U1, 1.0),
    field("hour", 8, Wire::U1, 1.0),
    field("min", 9, Wire::U1, 1.0),
    field("second", 10, Wire::U1, 1.0),
    field("valid", 11, Wire::U1, 1.0),
    field("tAcc", 12, Wire::U4, 1.0),
    field("nano", 16, Wire::I4, 1.0),
    field("fixType", 20, Wire::U1, 1.0),
    field("flags", 21, Wire::U1, 1.0),
    field("flags2", 22, Wire::U1, 1.0),
    field("numSV", 23, Wire::U1, 1.0),
    field("lon", 24, Wire::I4, 1e-7),
    field("lat", 28, Wire::I4, 1e-7),
    field("height", 32, Wire::I4, 1.0),
    field("hMSL", 36, Wire::I4, 1.0),
    field("hAcc", 40, Wire::U4, 1.0),
    field("vAcc", 44, Wire::U4, 1.0),
    field("velN", 48, Wire::I4, 1.0),
    field("velE", 52, Wire::I4, 1.0),
    field("velD", 56, Wire::I4, 1.0),
    field("gSpeed", 60, Wire::I4, 1.0),
    field("headMot", 64, Wire::I4, 1e-5),
    field("sAcc", 68, Wire::U4, 1.0),
    field("headAcc", 72, Wire::U4, 1e-5),
    field("pDOP", 76, Wire::U2, 1e-2),
    field("headVeh", 84, Wire::I4, 1e-5),
    field("magDec", 88, Wire::I2, 1e-2),
    field("magAcc", 90, Wire::U2, 1e-2),
];

const NAV_PVAT: &[FieldSpec] = &[
    field("iTOW", 0, Wire::U4, 1.0),
    field("version", 4, Wire::U1, 1.0),
    field("valid", 5, Wire::U1, 1.0),
    field("year", 6, Wire::U2, 1.0),
    field("month", 8, Wire::U1, 1.0),
    field("day", 9, Wire::U1, 1.0),
    field("hour", 10, Wire::U1, 1.0),
    field("min", 11, Wire::U1, 1.0),
    field("sec", 12, Wire::U1, 1.0),
    field("tAcc", 16, Wire::U4, 1.0),
    field("nano", 20, Wire::I4, 1.0),
    field("fixType", 24, Wire::U1, 1.0),
    field("flags", 25, Wire::U1, 1.0),
    field("flags2", 26, Wire::U1, 1.0),
    field("numSV", 27, Wire::U1, 1.0),
    field("lon", 28, Wire::I4, 1e-7),
    field("lat", 32, Wire::I4, 1e-7),
    field("height", 36, Wire::I4, 1.0),
    field("hMSL", 40, Wire::I4, 1.0),
    field("hAcc", 44, Wire::U4, 1.0),
    field("vAcc", 48, Wire::U4, 1.0),
    field("velN", 52, Wire::I4, 1.0),
    field("velE", 56, Wire::I4, 1.0),
    field("velD", 60, Wire::I4, 1.0),
    field("gSpeed", 64, Wire::I4, 1.0),
    field("sAcc", 68, Wire::U4, 1.0),
    field("vehRoll", 72, Wire::I4, 1e-5),
    field("vehPitch", 76, Wire::I4, 1e-5),
    field("vehHeading", 80, Wire::I4, 1e-5),
    field("motHeading", 84, Wire::I4, 1e-5),
    field("accRoll", 88, Wire::U2, 1e-2),
    field("accPitch", 90, Wire::U2, 1e-2),
    field("accHeading", 92, Wire::U2, 1e-2),
    field("magDec", 94, Wire::I2, 1e-2),
    field("magAcc", 96, Wire::U2, 1e-2),
    field("errEllipseOrient", 98, Wire::U2, 1e-2),
    field("errEllipseMajor", 100, Wire::U4, 1.0),
    field("errEllipseMinor", 104, Wire::U4, 1.0),
];

const ESF_INS: &[FieldSpec] = &[
    field("bitfield0", 0, Wire::U4, 1.0),
    field("iTOW", 8, Wire::U4, 1.0),
    field("xAngRate", 12, Wire::I4, 1e-3),
    field("yAngRate", 16, Wire::I4, 1e-3),
    field("zAngRate", 20, Wire::I4, 1e-3),
    field("xAccel", 24, Wire::I4, 1e-2),
    field("yAccel", 28, Wire::I4, 1e-2),
    field("zAccel", 32, Wire::I4, 1e-2),
];

const ESF_ALG: &[FieldSpec] = &[
    field("iTOW", 0, Wire::U4, 1.0),
    field("version", 4, Wire::U1, 1.0),
    field("flags", 5, Wire::U1, 1.0),
    field("error", 6, Wire::U1, 1.0),
    field("yaw", 8, Wire::U4, 1e-2),
    field("pitch", 12, Wire::I2, 1e-2),
    field("roll", 14, Wire::I2, 1e-2),
];

const ESF_STATUS: &[FieldSpec] = &[
    field("iTOW", 0, Wire::U4, 1.0),
    field("version", 4, Wire::U1, 1.0),
    field("fusionMode", 12, Wire::U1, 1.0),
    field("numSens", 15, Wire::U1, 1.0),
];

const ESF_MEAS: &[FieldSpec] = &[
    field("timeTag", 0, Wire::U4, 1.0),
    field("flags", 4, Wire::U2, 1.0),
    field("id", 6, Wire::U2, 1.0),
];

pub static LAYOUTS: &[UbxLayout] = &[
    UbxLayout { identity: "NAV-ATT", class: 0x01, id: 0x05, min_len: 32, fields: NAV_ATT },
    UbxLayout { identity: "NAV-PVT", class: 0x01, id: 0x07, min_len: 92, fields: NAV_PVT },
    UbxLayout { identity: "NAV-PVAT", class: 0x01, id: 0x17, min_len: 116, fields: NAV_PVAT },
    UbxLayout { identity: "ESF-MEAS", class: 0x10, id: 0x02, min_len: 8, fields: ESF_MEAS },
    UbxLayout { identity: "ESF-STATUS", class: 0x10, id: 0x10, min_len: 16, fields: ESF_STATUS },
    UbxLayout { identity: "ESF-ALG", class: 0x10, id: 0x14, min_len: 16, fields: ESF_ALG },
    UbxLayout { identity: "ESF-INS", class: 0x10, id: 0x15, min_len: 36, fields: ESF_INS },
];

pub fn layout_for(identity: &str) -> Option<&'static UbxLayout> {
    LAYOUTS.iter().find(|layout| layout.identity == identity)
}

fn layout_by_id(class: u8, id: u8) -> Option<&'static UbxLayout> {
    LAYOUTS
        .iter()
        .find(|layout| layout.class == class && layout.id == id)
}

/// 8-bit Fletcher checksum over class, id, length and payload.
pub fn fletcher(data: &[u8]) -> (u8, u8) {
    let mut ck_a = 0_u8;
    let mut ck_b = 0_u8;
    for byte in data {
        ck_a = ck_a.wrapping_add(*byte);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

/// Builds a complete frame around `payload`.
pub fn build_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + HEADER_LEN + CHECKSUM_LEN);
    frame.extend_from_slice(&[SYNC_CHAR_1, SYNC_CHAR_2, class, id]);
    frame.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    frame.extend_from_slice(payload);
    let (ck_a, ck_b) = fletcher(&frame[2..]);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("checksum mismatch in {identity} frame")]
    BadChecksum { identity: String },
    #[error("frame truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("{identity} payload too short: {len} < {min}")]
    ShortPayload {
        identity: String,
        len: usize,
        min: usize,
    },
    #[error("embedded sentence failed validation")]
    BadSentence,
}

impl DecodeError {
    pub fn fault(&self) -> FaultKind {
        match self {
            DecodeError::ShortPayload { .. } => FaultKind::UnparseableField,
            _ => FaultKind::ChecksumFailure,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameValues {
    /// Decoded through a layout table.
    Named(Vec<(&'static str, f64)>),
    /// Fields of an NMEA sentence found in the binary stream.
    Positional(SentenceFields),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub identity: String,
    /// Payload length for UBX frames, sentence length for NMEA.
    pub length: usize,
    pub values: FrameValues,
}

/// One unit read off the binary stream.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    /// 1-based position in the stream.
    pub index: usize,
    pub raw: &'a [u8],
    pub result: Result<DecodedFrame, DecodeError>,
}

/// Lazy frame iterator over a byte buffer.
///
/// Bytes that start neither a UBX frame nor an NMEA sentence are skipped and
/// counted. After a failed frame the reader resumes scanning one byte past
/// the failed sync position.
pub struct UbxReader<'a> {
    buf: &'a [u8],
    pos: usize,
    frames: usize,
    skipped: usize,
}

impl<'a> UbxReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            frames: 0,
            skipped: 0,
        }
    }

    pub fn skipped_bytes(&self) -> usize {
        self.skipped
    }

    fn emit(&mut self, raw: &'a [u8], result: Result<DecodedFrame, DecodeError>) -> Frame<'a> {
        self.frames += 1;
        Frame {
            index: self.frames,
            raw,
            result,
        }
    }

    fn read_ubx(&mut self) -> Frame<'a> {
        let rest = &self.buf[self.pos..];
        if rest.len() < HEADER_LEN {
            self.pos = self.buf.len();
            return self.emit(
                rest,
                Err(DecodeError::Truncated {
                    needed: HEADER_LEN,
                    available: rest.len(),
                }),
            );
        }

        let class = rest[2];
        let id = rest[3];
        let len = u16::from_le_bytes([rest[4], rest[5]]) as usize;
        let total = HEADER_LEN + len + CHECKSUM_LEN;
        if rest.len() < total {
            self.pos += 1;
            return self.emit(
                &rest[..HEADER_LEN],
                Err(DecodeError::Truncated {
                    needed: total,
                    available: rest.len(),
                }),
            );
        }

        let raw = &rest[..total];
        let layout = layout_by_id(class, id);
        let identity = layout
            .map(|l| l.identity.to_string())
            .unwrap_or_else(|| format!("UBX-{:02X}-{:02X}", class, id));

        let (ck_a, ck_b) = fletcher(&raw[2..HEADER_LEN + len]);
        if (ck_a, ck_b) != (raw[total - 2], raw[total - 1]) {
            self.pos += 1;
            return self.emit(raw, Err(DecodeError::BadChecksum { identity }));
        }

        self.pos += total;
        let payload = &raw[HEADER_LEN..HEADER_LEN + len];
        let result = match layout {
            Some(layout) if len < layout.min_len => Err(DecodeError::ShortPayload {
                identity,
                len,
                min: layout.min_len,
            }),
            Some(layout) => Ok(DecodedFrame {
                identity,
                length: len,
                values: FrameValues::Named(
                    layout
                        .fields
                        .iter()
                        .map(|spec| {
                            let bytes = &payload[spec.offset..spec.offset + spec.wire.size()];
                            (spec.name, spec.wire.read(bytes) * spec.scale)
                        })
                        .collect(),
                ),
            }),
            None => Ok(DecodedFrame {
                identity,
                length: len,
                values: FrameValues::Named(Vec::new()),
            }),
        };
        self.emit(raw, result)
    }

    /// Reads an NMEA sentence starting at `$`; `None` when no line end follows.
    fn read_sentence(&mut self) -> Option<Frame<'a>> {
        let rest = &self.buf[self.pos..];
        let window = &rest[..rest.len().min(MAX_SENTENCE_LEN)];
        let end = window.iter().position(|&b| b == b'\n')? + 1;
        let raw = &rest[..end];

        let parsed = std::str::from_utf8(raw)
            .ok()
            .map(NmeaSentenceParser::parse);
        match parsed {
            Some(SentenceParse::Parsed { id, fields }) => {
                self.pos += end;
                Some(self.emit(
                    raw,
                    Ok(DecodedFrame {
                        identity: id,
                        length: end,
                        values: FrameValues::Positional(fields),
                    }),
                ))
            }
            _ => {
                self.pos += 1;
                Some(self.emit(raw, Err(DecodeError::BadSentence)))
            }
        }
    }
}

impl<'a> Iterator for UbxReader<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Frame<'a>> {
        while self.pos < self.buf.len() {
            let rest = &self.buf[self.pos..];
            if rest[0] == SYNC_CHAR_1 && rest.get(1) == Some(&SYNC_CHAR_2) {
                return Some(self.read_ubx());
            }
            if rest[0] == b'$' && rest.get(1).map_or(false, u8::is_ascii_uppercase) {
                if let Some(frame) = self.read_sentence() {
                    return Some(frame);
                }
            }
            self.pos += 1;
            self.skipped += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::nmea::with_checksum;

    fn att_payload(itow: u32, roll: i32, pitch: i32) -> Vec<u8> {
        let mut payload = vec![0u8; 32];
        payload[0..4].copy_from_slice(&itow.to_le_bytes());
        payload[8..12].copy_from_slice(&roll.to_le_bytes());
        payload[12..16].copy_from_slice(&pitch.to_le_bytes());
        payload
    }

    fn named(frame: &DecodedFrame, name: &str) -> f64 {
        match &frame.values {
            FrameValues::Named(values) => values
                .iter()
                .find(|(field, _)| *field == name)
                .map(|(_, v)| *v)
                .unwrap(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decodes_scaled_attitude() {
        let frame = build_frame(0x01, 0x05, &att_payload(345_000, -150_000, 250_000));
        let mut reader = UbxReader::new(&frame);
        let decoded = reader.next().unwrap();
        assert_eq!(decoded.index, 1);
        assert_eq!(decoded.raw, &frame[..]);
        let decoded = decoded.result.unwrap();
        assert_eq!(decoded.identity, "NAV-ATT");
        assert_eq!(named(&decoded, "iTOW"), 345_000.0);
        assert!((named(&decoded, "roll") + 1.5).abs() < 1e-9);
        assert!((named(&decoded, "pitch") - 2.5).abs() < 1e-9);
        assert!(reader.next().is_none());
    }

    #[test]
    fn unknown_identity_is_reported_with_length() {
        let frame = build_frame(0x0a, 0x04, &[1, 2, 3]);
        let decoded = UbxReader::new(&frame).next().unwrap().result.unwrap();
        assert_eq!(decoded.identity, "UBX-0A-04");
        assert_eq!(decoded.length, 3);
    }

    #[test]
    fn resynchronizes_after_corrupt_frame() {
        let mut corrupt = build_frame(0x01, 0x05, &att_payload(1, 0, 0));
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xff;
        let good = build_frame(0x01, 0x05, &att_payload(2, 0, 0));

        let mut stream = vec![0x00, 0x13];
        stream.extend_from_slice(&corrupt);
        stream.extend_from_slice(&good);

        let mut reader = UbxReader::new(&stream);
        let frames: Vec<_> = reader.by_ref().collect();
        assert_eq!(frames.len(), 2);
        assert!(matches!(
            frames[0].result,
            Err(DecodeError::BadChecksum { .. })
        ));
        assert_eq!(frames[1].index, 2);
        assert_eq!(frames[1].raw, &good[..]);
        assert_eq!(named(frames[1].result.as_ref().unwrap(), "iTOW"), 2.0);
        assert_eq!(reader.skipped_bytes(), 2 + corrupt.len() - 1);
    }

    #[test]
    fn short_payload_is_a_decode_failure() {
        let frame = build_frame(0x01, 0x17, &[0u8; 20]);
        let decoded = UbxReader::new(&frame).next().unwrap();
        let err = decoded.result.unwrap_err();
        assert_eq!(err.fault(), FaultKind::UnparseableField);
    }

    #[test]
    fn embedded_sentence_is_framed_to_line_end() {
        let sentence = with_checksum("$GNGGA,1,2") + "\r\n";
        let mut stream = sentence.clone().into_bytes();
        stream.extend_from_slice(&build_frame(0x01, 0x05, &att_payload(9, 0, 0)));

        let frames: Vec<_> = UbxReader::new(&stream).collect();
        assert_eq!(frames.len(), 2);
        let first = frames[0].result.as_ref().unwrap();
        assert_eq!(first.identity, "GNGGA");
        assert_eq!(first.length, sentence.len());
        assert_eq!(frames[1].result.as_ref().unwrap().identity, "NAV-ATT");
    }

    #[test]
    fn truncated_tail_ends_the_stream() {
        let frame = build_frame(0x01, 0x05, &att_payload(1, 0, 0));
        let frames: Vec<_> = UbxReader::new(&frame[..10]).collect();
        assert!(matches!(
            frames[0].result,
            Err(DecodeError::Truncated { .. })
        ));
    }
}

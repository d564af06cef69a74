//! Checksum-delimited ASCII sentences: `$ID,f1,f2,...*CK`.

use crate::records::message::FieldValue;

pub const START_MARKER: u8 = b'$';
pub const END_MARKER: u8 = b'*';
pub const FIELD_SEPARATOR: char = ',';

/// XOR checksum over the bytes strictly between `$` and `*`.
pub struct ChecksumValidator;

impl ChecksumValidator {
    pub fn compute(payload: &[u8]) -> u8 {
        payload.iter().fold(0u8, |acc, byte| acc ^ byte)
    }

    /// True when the two hex digits after `*` match the recomputed checksum.
    ///
    /// A sentence without both markers, or with `*` before `$`, is invalid.
    pub fn is_valid(sentence: &str) -> bool {
        let bytes = sentence.as_bytes();
        let start = bytes.iter().position(|&b| b == START_MARKER);
        let end = bytes.iter().position(|&b| b == END_MARKER);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => return false,
        };

        let digits = match bytes.get(end + 1..end + 3) {
            Some(digits) if digits.iter().all(u8::is_ascii_hexdigit) => digits,
            _ => return false,
        };
        let expected = match std::str::from_utf8(digits)
            .ok()
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            Some(value) => value,
            None => return false,
        };

        Self::compute(&bytes[start + 1..end]) == expected
    }
}

/// Field vector of a sentence: either every field parsed as a number or none did.
#[derive(Debug, Clone, PartialEq)]
pub enum SentenceFields {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl SentenceFields {
    fn from_payload(payload: &str) -> Self {
        let raw: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();
        let numeric: Result<Vec<f64>, _> = raw.iter().map(|field| field.trim().parse()).collect();
        match numeric {
            Ok(values) => SentenceFields::Numeric(values),
            Err(_) => SentenceFields::Text(raw.into_iter().map(str::to_string).collect()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SentenceFields::Numeric(values) => values.len(),
            SentenceFields::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_text(&self) -> bool {
        matches!(self, SentenceFields::Text(_))
    }

    /// Numeric value at `index`, coercing a text field if it happens to parse.
    pub fn number_at(&self, index: usize) -> Option<f64> {
        match self {
            SentenceFields::Numeric(values) => values.get(index).copied(),
            SentenceFields::Text(values) => values.get(index).and_then(|v| v.trim().parse().ok()),
        }
    }

    pub fn into_values(self) -> Vec<FieldValue> {
        match self {
            SentenceFields::Numeric(values) => values.into_iter().map(FieldValue::Number).collect(),
            SentenceFields::Text(values) => values.into_iter().map(FieldValue::Text).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SentenceParse {
    Parsed { id: String, fields: SentenceFields },
    /// Missing delimiters or failed checksum; carries the line verbatim.
    Error(String),
}

pub struct NmeaSentenceParser;

impl NmeaSentenceParser {
    pub fn parse(line: &str) -> SentenceParse {
        let start = line.find(START_MARKER as char);
        let end = line.find(END_MARKER as char);
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) if start < end => (start, end),
            _ => return SentenceParse::Error(line.to_string()),
        };
        if !ChecksumValidator::is_valid(&line[start..]) {
            return SentenceParse::Error(line.to_string());
        }

        let interior = &line[start + 1..end];
        let (id, fields) = match interior.split_once(FIELD_SEPARATOR) {
            Some((id, payload)) => (id, SentenceFields::from_payload(payload)),
            None => (interior, SentenceFields::Numeric(Vec::new())),
        };
        SentenceParse::Parsed {
            id: id.to_string(),
            fields,
        }
    }
}

/// Appends `*CK` to a sentence body such as `$PINS1,1,2`.
pub fn with_checksum(body: &str) -> String {
    let payload = body.strip_prefix(START_MARKER as char).unwrap_or(body);
    format!(
        "${}*{:02X}",
        payload,
        ChecksumValidator::compute(payload.as_bytes())
    )
}

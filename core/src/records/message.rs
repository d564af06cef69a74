use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view; text that does not parse yields NaN.
    pub fn as_f64(&self) -> f64 {
        match self {
            FieldValue::Number(value) => *value,
            FieldValue::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
        }
    }

    pub fn is_numeric(&self) -> bool {
        match self {
            FieldValue::Number(_) => true,
            FieldValue::Text(text) => text.trim().parse::<f64>().is_ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{}", value),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// A decoded record of one configured message kind, fields in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessage {
    pub kind: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl DecodedMessage {
    pub fn new(kind: impl Into<String>, fields: Vec<(String, FieldValue)>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).map(FieldValue::as_f64)
    }
}

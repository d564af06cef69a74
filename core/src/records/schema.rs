use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::prelude::{IngestError, IngestResult, LogFormat};
use crate::protocol::ubx;
use crate::records::message::{DecodedMessage, FieldValue};

fn default_time_field() -> String {
    "iTOW".to_string()
}

/// Field layout of one configured message kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KindSchema {
    /// Name the series is stored under, e.g. `PVAT`.
    pub name: String,
    /// Wire identity, e.g. `PINS1` or `NAV-PVAT`.
    pub identity: String,
    pub fields: Vec<String>,
    #[serde(default = "default_time_field")]
    pub time_field: String,
}

impl KindSchema {
    pub fn new(name: &str, identity: &str, fields: &[&str], time_field: &str) -> Self {
        Self {
            name: name.to_string(),
            identity: identity.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            time_field: time_field.to_string(),
        }
    }

    /// Schema carrying every field of a known UBX layout.
    pub fn from_ubx_layout(name: &str, identity: &str, time_field: &str) -> Option<Self> {
        let layout = ubx::layout_for(identity)?;
        let fields: Vec<&str> = layout.fields.iter().map(|f| f.name).collect();
        Some(Self::new(name, identity, &fields, time_field))
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    pub fn time_index(&self) -> Option<usize> {
        self.field_index(&self.time_field)
    }

    /// Pairs positional values with field names; `None` on a count mismatch.
    pub fn message_from_values(&self, values: Vec<FieldValue>) -> Option<DecodedMessage> {
        if values.len() != self.fields.len() {
            return None;
        }
        Some(DecodedMessage::new(
            self.name.clone(),
            self.fields.iter().cloned().zip(values).collect(),
        ))
    }

    /// Picks schema fields out of a named value list; `None` if any is absent.
    pub fn message_from_named(&self, values: &[(&str, f64)]) -> Option<DecodedMessage> {
        let fields = self
            .fields
            .iter()
            .map(|name| {
                values
                    .iter()
                    .find(|(field, _)| field == name)
                    .map(|(_, value)| (name.clone(), FieldValue::Number(*value)))
            })
            .collect::<Option<Vec<_>>>()?;
        Some(DecodedMessage::new(self.name.clone(), fields))
    }
}

/// The fixed set of navigation kinds for one protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSet {
    pub kinds: Vec<KindSchema>,
    /// Kind whose time-of-week is borrowed by laser lines in the text path.
    #[serde(default)]
    pub primary: Option<String>,
}

impl SchemaSet {
    pub fn new(kinds: Vec<KindSchema>, primary: Option<&str>) -> Self {
        Self {
            kinds,
            primary: primary.map(str::to_string),
        }
    }

    /// Inertial unit sentences (`$PINS1`, `$PSTRB`) of the text protocol.
    pub fn inertial_nmea() -> Self {
        Self::new(
            vec![
                KindSchema::new(
                    "PINS1",
                    "PINS1",
                    &[
                        "iTOW",
                        "GPSWeek",
                        "insStatus",
                        "hdwStatus",
                        "roll",
                        "pitch",
                        "heading",
                        "velX",
                        "velY",
                        "velZ",
                        "lon",
                        "lat",
                        "height",
                        "OffsetLLA_N",
                        "OffsetLLA_E",
                        "OffsetLLA_D",
                    ],
                    "iTOW",
                ),
                KindSchema::new("PSTRB", "PSTRB", &["GPSWeek", "iToW", "pin", "count"], "iToW"),
            ],
            Some("PINS1"),
        )
    }

    /// u-blox navigation and sensor-fusion messages of the binary protocol.
    pub fn ubx_navigation() -> Self {
        let kinds = [
            ("PVT", "NAV-PVT", "iTOW"),
            ("ATT", "NAV-ATT", "iTOW"),
            ("MEAS", "ESF-MEAS", "timeTag"),
            ("INS", "ESF-INS", "iTOW"),
            ("ALG", "ESF-ALG", "iTOW"),
            ("STATUS", "ESF-STATUS", "iTOW"),
            ("PVAT", "NAV-PVAT", "iTOW"),
        ]
        .iter()
        .filter_map(|(name, identity, time)| KindSchema::from_ubx_layout(name, identity, time))
        .collect();
        Self::new(kinds, None)
    }

    pub fn by_identity(&self, identity: &str) -> Option<&KindSchema> {
        self.kinds.iter().find(|k| k.identity == identity)
    }

    pub fn by_name(&self, name: &str) -> Option<&KindSchema> {
        self.kinds.iter().find(|k| k.name == name)
    }

    /// Checks the schema once, before any parsing.
    pub fn validate(&self, format: LogFormat) -> IngestResult<()> {
        if self.kinds.is_empty() {
            return Err(IngestError::InvalidSchema("no message kinds configured".into()));
        }

        let mut names = HashSet::new();
        let mut identities = HashSet::new();
        for kind in &self.kinds {
            if !names.insert(kind.name.as_str()) {
                return Err(IngestError::InvalidSchema(format!(
                    "duplicate kind name `{}`",
                    kind.name
                )));
            }
            if !identities.insert(kind.identity.as_str()) {
                return Err(IngestError::InvalidSchema(format!(
                    "duplicate identity `{}`",
                    kind.identity
                )));
            }
            if kind.time_index().is_none() {
                return Err(IngestError::InvalidSchema(format!(
                    "kind `{}` lacks its time field `{}`",
                    kind.name, kind.time_field
                )));
            }
            if format == LogFormat::BinaryWithMarkers {
                validate_binary_kind(kind)?;
            }
        }

        if let Some(primary) = &self.primary {
            if self.by_name(primary).is_none() {
                return Err(IngestError::InvalidSchema(format!(
                    "primary kind `{}` is not configured",
                    primary
                )));
            }
        }
        Ok(())
    }
}

fn validate_binary_kind(kind: &KindSchema) -> IngestResult<()> {
    let layout = ubx::layout_for(&kind.identity).ok_or_else(|| {
        IngestError::InvalidSchema(format!("no UBX layout for `{}`", kind.identity))
    })?;
    match kind
        .fields
        .iter()
        .find(|field| !layout.fields.iter().any(|spec| spec.name == field.as_str()))
    {
        Some(field) => Err(IngestError::InvalidSchema(format!(
            "`{}` has no field `{}`",
            kind.identity, field
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_validate() {
        SchemaSet::inertial_nmea()
            .validate(LogFormat::InterleavedText)
            .unwrap();
        let ubx = SchemaSet::ubx_navigation();
        assert_eq!(ubx.kinds.len(), 7);
        ubx.validate(LogFormat::BinaryWithMarkers).unwrap();
    }

    #[test]
    fn missing_time_field_is_rejected() {
        let set = SchemaSet::new(vec![KindSchema::new("X", "X", &["a"], "iTOW")], None);
        assert!(matches!(
            set.validate(LogFormat::InterleavedText),
            Err(IngestError::InvalidSchema(_))
        ));
    }

    #[test]
    fn unknown_primary_is_rejected() {
        let mut set = SchemaSet::inertial_nmea();
        set.primary = Some("PVAT".into());
        assert!(set.validate(LogFormat::InterleavedText).is_err());
    }

    #[test]
    fn positional_values_need_matching_count() {
        let kind = KindSchema::new("PSTRB", "PSTRB", &["GPSWeek", "iToW", "pin", "count"], "iToW");
        let values = vec![FieldValue::Number(2200.0), FieldValue::Number(1.0)];
        assert!(kind.message_from_values(values).is_none());

        let values = [2200.0, 345.0, 1.0, 7.0].map(FieldValue::Number).to_vec();
        let message = kind.message_from_values(values).unwrap();
        assert_eq!(message.number("iToW"), Some(345.0));
    }

    #[test]
    fn named_values_select_schema_fields() {
        let kind = KindSchema::new("ATT", "NAV-ATT", &["iTOW", "pitch"], "iTOW");
        let message = kind
            .message_from_named(&[("iTOW", 10.0), ("roll", 1.0), ("pitch", 2.0)])
            .unwrap();
        assert_eq!(message.fields.len(), 2);
        assert_eq!(message.number("pitch"), Some(2.0));
        assert!(kind.message_from_named(&[("iTOW", 10.0)]).is_none());
    }

    #[test]
    fn binary_fields_must_exist_in_layout() {
        let set = SchemaSet::new(
            vec![KindSchema::new("ATT", "NAV-ATT", &["iTOW", "bogus"], "iTOW")],
            None,
        );
        assert!(set.validate(LogFormat::BinaryWithMarkers).is_err());
        assert!(set.validate(LogFormat::InterleavedText).is_ok());
    }
}
